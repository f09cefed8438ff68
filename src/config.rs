use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Domain base used when neither the CLI nor the environment provides one.
pub const DEFAULT_DOMAIN: &str = "base.domain";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Base domain appended to every short name to form its FQDN.
    pub domain: String,
    /// Target hosts file carrying the managed section.
    pub hosts_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.into(),
            hosts_file: PathBuf::from("/etc/hosts"),
        }
    }
}

impl Config {
    /// Resolve the configuration once at startup. Precedence, lowest first:
    /// built-in defaults, `hostsync.toml`, `DOCKER_HOSTS_*` environment
    /// variables. A CLI override, if any, is applied by the caller.
    pub fn load() -> anyhow::Result<Self> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("hostsync.toml"))
            .merge(Env::prefixed("DOCKER_HOSTS_"))
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
    }
}

/// Parse an update interval such as `30s`, `5m`, `1h` or `1d`.
pub fn parse_interval(raw: &str) -> anyhow::Result<Duration> {
    let unit = raw
        .chars()
        .last()
        .ok_or_else(|| anyhow::anyhow!("empty interval; use a value like '30s', '5m' or '1h'"))?;

    let multiplier = match unit.to_ascii_lowercase() {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        _ => anyhow::bail!("unsupported time unit '{}'; use s, m, h or d", unit),
    };

    let value: u64 = raw[..raw.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid interval '{}'; use a value like '30s' or '5m'", raw))?;

    if value == 0 {
        anyhow::bail!("interval must be positive");
    }

    Ok(Duration::from_secs(value * multiplier))
}
