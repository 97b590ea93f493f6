use crate::error::Error;
use chrono_tz::Tz;
use config::{Config, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Shared watch folder the workers pull files from.
    pub source_root: PathBuf,
    /// Where the daily metadata ledgers are written.
    pub output_folder: PathBuf,
    /// IANA zone used for filesystem timestamps and ledger partition dates.
    pub timezone: String,
    pub idle_wait_secs: u64,
    pub probe: ProbeConfig,
    pub fixity: FixityConfig,
    pub claim: ClaimConfig,
    pub naming: NamingConfig,
    pub ledger: LedgerConfig,
    pub registry: RegistryConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub program: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FixityConfig {
    pub checksum_extension: String,
    /// Hash the file and write the sidecar when it is missing, instead of failing.
    pub generate_missing: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClaimConfig {
    pub marker_suffix: String,
    pub restricted_sentinel: String,
    /// Written next to the claim marker once processing of the file ended, successfully or not.
    pub settled_suffix: String,
    /// Markers older than this may be taken over by another worker. `None` keeps them forever.
    pub stale_after_secs: Option<u64>,
    /// Remove the marker after a successful cycle. Only useful when something
    /// else moves processed files out of the watch folder.
    pub release_on_success: bool,
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NamingConfig {
    pub flexible: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub write_json_sidecar: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub auth_scheme: String,
    pub timeout_secs: u64,
    pub placeholder: String,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first try.
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("/mount/watch/"),
            output_folder: PathBuf::from("/mount/output/"),
            timezone: "Australia/Victoria".to_string(),
            idle_wait_secs: 3600,
            probe: ProbeConfig::default(),
            fixity: FixityConfig::default(),
            claim: ClaimConfig::default(),
            naming: NamingConfig::default(),
            ledger: LedgerConfig::default(),
            registry: RegistryConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            program: "ffprobe".to_string(),
            timeout_secs: 300,
        }
    }
}

impl Default for FixityConfig {
    fn default() -> Self {
        Self {
            checksum_extension: "md5".to_string(),
            generate_missing: false,
        }
    }
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            marker_suffix: ".lock".to_string(),
            restricted_sentinel: "_RESTRICTED_".to_string(),
            settled_suffix: ".done".to_string(),
            stale_after_secs: None,
            release_on_success: false,
            ignore_patterns: Vec::new(),
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self { flexible: false }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            write_json_sidecar: false,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: String::new(),
            auth_scheme: "Bearer".to_string(),
            timeout_secs: 120,
            placeholder: "NOT UPLOADED".to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl AppConfig {
    pub fn tz(&self) -> Result<Tz, Error> {
        parse_timezone(&self.timezone)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_secs(self.idle_wait_secs)
    }

    /// Check the values serde cannot, and normalize the registry endpoint to end in `/`.
    ///
    /// An empty endpoint is allowed here; only commands that talk to the
    /// registry require one.
    pub fn validate(mut self) -> Result<Self, Error> {
        self.tz()?;
        if !self.registry.endpoint.is_empty() && !self.registry.endpoint.ends_with('/') {
            self.registry.endpoint.push('/');
        }
        if self.fixity.checksum_extension.is_empty()
            || self.claim.marker_suffix.is_empty()
            || self.claim.settled_suffix.is_empty()
        {
            return Err(Error::InvalidConfig(
                "checksum extension and marker suffixes must not be empty".to_string(),
            ));
        }
        if self.claim.settled_suffix == self.claim.marker_suffix {
            return Err(Error::InvalidConfig(
                "claim.settled_suffix must differ from claim.marker_suffix".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            self.retry.max_attempts = 1;
        }
        Ok(self)
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, Error> {
    name.parse::<Tz>()
        .map_err(|_| Error::InvalidConfig(format!("unknown timezone '{}'", name)))
}

/// Defaults, then `Config.toml` if present, then `VIDSYNC_*` environment variables
/// (`__` separates sections, e.g. `VIDSYNC_REGISTRY__TOKEN`).
pub fn load_configuration() -> Result<AppConfig, Error> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("VIDSYNC")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("claim.ignore_patterns")
                .try_parsing(true),
        )
        .build()?;
    let config = builder.try_deserialize::<AppConfig>()?;
    config.validate()
}
