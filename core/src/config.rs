use crate::error::ConfigError;
use serde::Deserialize;
use slb_protocol::SessionId;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Per-project broker configuration, loaded from `<project>/.slb/config.toml`
/// with CLI overrides layered on top by the binaries that construct it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Session ids permitted to approve their own requests.
    pub trusted_self_approvers: HashSet<SessionId>,
    /// Timeout, per risk tier, after which a pending request is swept to
    /// `timeout` by the request service's background sweeper.
    pub timeouts: TierTimeouts,
    /// Default poll interval for the fallback (daemon-less) watcher.
    #[serde(with = "humantime_seconds")]
    pub poll_interval: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            trusted_self_approvers: HashSet::new(),
            timeouts: TierTimeouts::default(),
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TierTimeouts {
    #[serde(with = "humantime_seconds")]
    pub caution: Duration,
    #[serde(with = "humantime_seconds")]
    pub dangerous: Duration,
    #[serde(with = "humantime_seconds")]
    pub critical: Duration,
}

impl Default for TierTimeouts {
    fn default() -> Self {
        Self {
            caution: Duration::from_secs(15 * 60),
            dangerous: Duration::from_secs(30 * 60),
            critical: Duration::from_secs(60 * 60),
        }
    }
}

impl TierTimeouts {
    pub fn for_tier(&self, tier: slb_protocol::RiskTier) -> Option<Duration> {
        match tier {
            slb_protocol::RiskTier::Safe => None,
            slb_protocol::RiskTier::Caution => Some(self.caution),
            slb_protocol::RiskTier::Dangerous => Some(self.dangerous),
            slb_protocol::RiskTier::Critical => Some(self.critical),
        }
    }
}

impl BrokerConfig {
    /// Load from `path` if it exists; otherwise return the defaults. A
    /// missing config file is not an error: most projects never need one.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

mod humantime_seconds {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_no_trusted_self_approvers() {
        let config = BrokerConfig::default();
        assert!(config.trusted_self_approvers.is_empty());
    }

    #[test]
    fn tier_timeouts_scale_with_risk() {
        let timeouts = TierTimeouts::default();
        assert!(timeouts.caution < timeouts.dangerous);
        assert!(timeouts.dangerous < timeouts.critical);
        assert_eq!(timeouts.for_tier(slb_protocol::RiskTier::Safe), None);
    }

    #[tokio::test]
    async fn load_returns_defaults_when_file_missing() {
        let config = BrokerConfig::load(Path::new("/nonexistent/slb-config.toml"))
            .await
            .expect("missing config file is not an error");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }
}
