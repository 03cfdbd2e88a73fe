//! Engine configuration.
//!
//! [`Config`] is immutable once an engine is built. It derives serde so an
//! external loader can fill it in; the log sink is runtime-only.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Dispatch;

use crate::error::HmhashError;

/// Type and amount of proof-of-work verification an engine performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Full verification and mining.
    #[default]
    Normal,
    /// Delegates to the process-wide engine.
    Shared,
    /// Full verification with test-sized resources.
    Test,
    /// Accepts every seal, still subject to the other consensus rules.
    Fake,
    /// [`Mode::Fake`] that rejects exactly one block number.
    #[serde(skip_deserializing)]
    FakeFail,
    /// [`Mode::Fake`] that sleeps before every verification.
    #[serde(skip_deserializing)]
    FakeDelay,
    /// Accepts everything without checking any rule.
    FullFake,
}

impl Mode {
    /// Whether this is one of the consensus-rule fakes (not [`Mode::FullFake`]).
    pub fn is_fake(&self) -> bool {
        matches!(self, Self::Fake | Self::FakeFail | Self::FakeDelay)
    }

    /// Whether seals are actually checked with the hash primitive.
    pub fn verifies_pow(&self) -> bool {
        matches!(self, Self::Normal | Self::Shared | Self::Test)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::Shared => "shared",
            Self::Test => "test",
            Self::Fake => "fake",
            Self::FakeFail => "fake-fail",
            Self::FakeDelay => "fake-delay",
            Self::FullFake => "full-fake",
        };
        f.write_str(name)
    }
}

/// Parses the externally configurable modes. The fail and delay fakes are
/// only reachable through their constructors.
impl FromStr for Mode {
    type Err = HmhashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "shared" => Ok(Self::Shared),
            "test" => Ok(Self::Test),
            "fake" => Ok(Self::Fake),
            "full-fake" | "fullfake" => Ok(Self::FullFake),
            other => Err(HmhashError::UnknownMode(other.to_string())),
        }
    }
}

/// Configuration parameters of an engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Verification mode.
    pub mode: Mode,
    /// When set, remote sealer notifications carry the full header JSON object
    /// instead of the work package array.
    #[serde(default)]
    pub notify_full: bool,
    /// Log sink for the engine's background tasks. Filled with the process
    /// default dispatcher at construction when absent.
    #[serde(skip)]
    pub log: Option<Dispatch>,
}

impl Config {
    /// Configuration with the given mode and defaults otherwise.
    pub fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_normal() {
        let cfg = Config::default();
        assert_eq!(cfg.mode, Mode::Normal);
        assert!(!cfg.notify_full);
        assert!(cfg.log.is_none());
    }

    #[test]
    fn mode_parses_external_names() {
        assert_eq!("normal".parse::<Mode>().unwrap(), Mode::Normal);
        assert_eq!("Shared".parse::<Mode>().unwrap(), Mode::Shared);
        assert_eq!("test".parse::<Mode>().unwrap(), Mode::Test);
        assert_eq!("fake".parse::<Mode>().unwrap(), Mode::Fake);
        assert_eq!("full-fake".parse::<Mode>().unwrap(), Mode::FullFake);
    }

    #[test]
    fn mode_rejects_constructor_only_names() {
        assert!(matches!(
            "fake-fail".parse::<Mode>(),
            Err(HmhashError::UnknownMode(name)) if name == "fake-fail"
        ));
        assert!("fake-delay".parse::<Mode>().is_err());
        assert!("turbo".parse::<Mode>().is_err());
    }

    #[test]
    fn mode_display_round_trips() {
        for mode in [Mode::Normal, Mode::Shared, Mode::Test, Mode::Fake, Mode::FullFake] {
            assert_eq!(mode.to_string().parse::<Mode>().unwrap(), mode);
        }
    }

    #[test]
    fn fake_family() {
        assert!(Mode::Fake.is_fake());
        assert!(Mode::FakeFail.is_fake());
        assert!(Mode::FakeDelay.is_fake());
        assert!(!Mode::FullFake.is_fake());
        assert!(!Mode::Normal.is_fake());
        assert!(Mode::Shared.verifies_pow());
        assert!(!Mode::FullFake.verifies_pow());
    }

    #[test]
    fn config_deserializes_from_loader() {
        let cfg: Config = serde_json::from_str(r#"{"mode":"full-fake","notify_full":true}"#).unwrap();
        assert_eq!(cfg.mode, Mode::FullFake);
        assert!(cfg.notify_full);
        assert!(cfg.log.is_none());

        let cfg: Config = serde_json::from_str(r#"{"mode":"test"}"#).unwrap();
        assert_eq!(cfg.mode, Mode::Test);
        assert!(!cfg.notify_full);

        assert!(serde_json::from_str::<Config>(r#"{"mode":"fake-fail"}"#).is_err());
    }

    #[test]
    fn config_serializes_without_log() {
        let cfg = Config {
            log: Some(Dispatch::none()),
            ..Config::with_mode(Mode::Test)
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert_eq!(json, r#"{"mode":"test","notify_full":false}"#);
    }
}
