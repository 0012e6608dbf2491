use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use config::builder::DefaultState;
use serde::Deserialize;
use thiserror::Error;

use crate::store::{
    DestinationStore, FtpStore, LocalStore, S3Store, SourceStore, StoreError, WebDavStore,
};
use crate::transfer::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("key {0} is missing from configuration file")]
    Missing(String),

    #[error("key {key} is invalid: {reason}")]
    Invalid { key: String, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FtpConfig {
    /// `host` or `host:port`
    pub hostname: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebDavConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Local { path: PathBuf },
    Ftp(FtpConfig),
    S3(S3Config),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DestinationConfig {
    Local { path: PathBuf },
    S3(S3Config),
    Webdav(WebDavConfig),
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub log_level: String,
    pub log_to_file: bool,
    pub log_file: String,
    pub polling_interval_secs: u64,
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
    pub retry: RetryConfig,
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub destination_folder: String,
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    Config::builder()
        // Set defaults
        .set_default("log_level", "info")?
        .set_default("log_to_file", false)?
        .set_default("log_file", "log/ferry.log")?
        .set_default("polling_interval_secs", 5)?
        .set_default("retry.max_attempts", 5)?
        .set_default("retry.delay_secs", 5)
}

/// Load `path` (YAML) over the defaults, then `FERRY_*` environment overrides
///
/// Nested keys use `__`, e.g. `FERRY_DESTINATION__PASSWORD`.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let s = defaults()?
        // Add configuration from a file
        .add_source(File::from(path).format(FileFormat::Yaml))
        // Add configuration from environment variables
        .add_source(
            Environment::with_prefix("FERRY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: AppConfig = s.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

/// Load from an in-memory YAML document, without environment overrides
pub fn load_config_str(yaml: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = defaults()?
        .add_source(File::from_str(yaml, FileFormat::Yaml))
        .build()?
        .try_deserialize()?;
    config.validate()?;
    Ok(config)
}

fn require(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(key.to_string()));
    }
    Ok(())
}

fn require_path(key: &str, value: &Path) -> Result<(), ConfigError> {
    require(key, &value.to_string_lossy())
}

impl S3Config {
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        for (key, value) in [
            ("bucket", &self.bucket),
            ("region", &self.region),
            ("endpoint", &self.endpoint),
            ("access_key_id", &self.access_key_id),
            ("secret_access_key", &self.secret_access_key),
        ] {
            require(&format!("{section}.{key}"), value)?;
        }
        Ok(())
    }

    fn build(&self) -> Result<S3Store, StoreError> {
        S3Store::new(
            &self.bucket,
            &self.region,
            &self.endpoint,
            &self.access_key_id,
            &self.secret_access_key,
            self.prefix.as_deref(),
        )
    }
}

impl SourceConfig {
    pub fn build(&self) -> Result<Arc<dyn SourceStore>, StoreError> {
        Ok(match self {
            SourceConfig::Local { path } => Arc::new(LocalStore::new(path)),
            SourceConfig::Ftp(ftp) => {
                Arc::new(FtpStore::new(&ftp.hostname, &ftp.username, &ftp.password))
            }
            SourceConfig::S3(s3) => Arc::new(s3.build()?),
        })
    }
}

impl DestinationConfig {
    pub fn build(&self) -> Result<Arc<dyn DestinationStore>, StoreError> {
        Ok(match self {
            DestinationConfig::Local { path } => Arc::new(LocalStore::new(path)),
            DestinationConfig::S3(s3) => Arc::new(s3.build()?),
            DestinationConfig::Webdav(dav) => {
                Arc::new(WebDavStore::new(&dav.url, &dav.username, &dav.password)?)
            }
        })
    }
}

impl AppConfig {
    /// Check the keys serde cannot: non-empty strings and sane bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.source {
            SourceConfig::Local { path } => require_path("source.path", path)?,
            SourceConfig::Ftp(ftp) => {
                require("source.hostname", &ftp.hostname)?;
                require("source.username", &ftp.username)?;
                require("source.password", &ftp.password)?;
            }
            SourceConfig::S3(s3) => s3.validate("source")?,
        }
        match &self.destination {
            DestinationConfig::Local { path } => require_path("destination.path", path)?,
            DestinationConfig::S3(s3) => s3.validate("destination")?,
            DestinationConfig::Webdav(dav) => {
                require("destination.url", &dav.url)?;
                require("destination.username", &dav.username)?;
                require("destination.password", &dav.password)?;
            }
        }
        require("destination_folder", &self.destination_folder)?;

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "retry.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.polling_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "polling_interval_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry.max_attempts, Duration::from_secs(self.retry.delay_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBDAV: &str = r#"
source:
  kind: local
  path: /srv/ftp/incoming
destination:
  kind: webdav
  url: https://cloud.example.com/remote.php/dav/files/me
  username: me
  password: secret
destination_folder: /photos
"#;

    #[test]
    fn test_defaults_applied() {
        let config = load_config_str(WEBDAV).unwrap();

        assert_eq!(config.log_level, "info");
        assert!(!config.log_to_file);
        assert_eq!(config.polling_interval(), Duration::from_secs(5));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(config.staging_dir.is_none());
        assert!(matches!(config.source, SourceConfig::Local { .. }));
        assert!(matches!(config.destination, DestinationConfig::Webdav(_)));
    }

    #[test]
    fn test_overrides() {
        let yaml = format!(
            "{WEBDAV}polling_interval_secs: 30\nretry:\n  max_attempts: 3\n  delay_secs: 1\nstaging_dir: /var/tmp\n"
        );
        let config = load_config_str(&yaml).unwrap();

        assert_eq!(config.polling_interval(), Duration::from_secs(30));
        assert_eq!(config.retry_policy(), RetryPolicy::new(3, Duration::from_secs(1)));
        assert_eq!(config.staging_dir, Some(PathBuf::from("/var/tmp")));
    }

    #[test]
    fn test_empty_required_key_rejected() {
        let yaml = WEBDAV.replace("password: secret", "password: \"\"");
        match load_config_str(&yaml) {
            Err(ConfigError::Missing(key)) => assert_eq!(key, "destination.password"),
            other => panic!("expected missing key, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_section_rejected() {
        let yaml = "destination_folder: /photos\n";
        assert!(matches!(load_config_str(yaml), Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let yaml = format!("{WEBDAV}retry:\n  max_attempts: 0\n  delay_secs: 5\n");
        assert!(matches!(
            load_config_str(&yaml),
            Err(ConfigError::Invalid { ref key, .. }) if key == "retry.max_attempts"
        ));
    }

    const FTP_SOURCE: &str = r#"
source:
  kind: ftp
  hostname: camera.lan
  username: camera
  password: secret
destination:
  kind: local
  path: /srv/archive
destination_folder: /photos
"#;

    #[test]
    fn test_ftp_source_builds() {
        let config = load_config_str(FTP_SOURCE).unwrap();
        match &config.source {
            SourceConfig::Ftp(ftp) => {
                assert_eq!(ftp.hostname, "camera.lan");
                assert_eq!(ftp.username, "camera");
            }
            other => panic!("expected ftp source, got {:?}", other),
        }
        assert_eq!(config.source.build().unwrap().name(), "ftp:camera.lan:21");
    }

    #[test]
    fn test_ftp_source_requires_credentials() {
        let yaml = FTP_SOURCE.replace("hostname: camera.lan", "hostname: \"\"");
        match load_config_str(&yaml) {
            Err(ConfigError::Missing(key)) => assert_eq!(key, "source.hostname"),
            other => panic!("expected missing key, got {:?}", other),
        }

        let yaml = FTP_SOURCE.replace("  password: secret\n", "");
        assert!(matches!(load_config_str(&yaml), Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_s3_source_builds() {
        let yaml = r#"
source:
  kind: s3
  bucket: drop
  region: us-east-1
  endpoint: http://localhost:9000
  access_key_id: key
  secret_access_key: secret
  prefix: incoming
destination:
  kind: local
  path: /srv/archive
destination_folder: /
"#;
        let config = load_config_str(yaml).unwrap();
        let source = config.source.build().unwrap();
        assert_eq!(source.name(), "s3:drop");
        let destination = config.destination.build().unwrap();
        assert_eq!(destination.name(), "local:/srv/archive");
    }
}
