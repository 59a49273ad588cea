use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;

/// Top-level configuration (loaded from confide.toml).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfideConfig {
    pub encryption: EncryptionConfig,
    pub migration: MigrationConfig,
}

/// Message encryption configuration.
///
/// `master_secret` is the process-wide secret used for per-message key
/// derivation. If it is absent, `fallback_app_secret` (an unrelated
/// application secret) may be used to derive one — a degraded posture that
/// is logged loudly at startup, never a silent failure.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Dedicated master secret for message encryption
    pub master_secret: Option<SecretString>,
    /// Unrelated application secret used only as a derivation fallback
    pub fallback_app_secret: Option<SecretString>,
}

/// Legacy-format migration tool configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Path to the message database
    pub database: PathBuf,
    /// Rows per batch (default: 100)
    pub batch_size: usize,
    /// Operator-cancellation delay before the first destructive batch, in
    /// seconds (default: 5)
    pub confirm_delay_secs: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("confide.db"),
            batch_size: 100,
            confirm_delay_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[encryption]
master_secret = "correct horse battery staple"

[migration]
database = "/var/lib/confide/messages.db"
batch_size = 250
confirm_delay_secs = 10
"#;
        let config: ConfideConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(
            config
                .encryption
                .master_secret
                .as_ref()
                .unwrap()
                .expose_secret(),
            "correct horse battery staple"
        );
        assert!(config.encryption.fallback_app_secret.is_none());
        assert_eq!(
            config.migration.database,
            PathBuf::from("/var/lib/confide/messages.db")
        );
        assert_eq!(config.migration.batch_size, 250);
        assert_eq!(config.migration.confirm_delay_secs, 10);
    }

    #[test]
    fn test_parse_defaults() {
        let config: ConfideConfig = toml::from_str("").unwrap();

        assert!(config.encryption.master_secret.is_none());
        assert!(config.encryption.fallback_app_secret.is_none());
        assert_eq!(config.migration.database, PathBuf::from("confide.db"));
        assert_eq!(config.migration.batch_size, 100);
        assert_eq!(config.migration.confirm_delay_secs, 5);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[encryption]
fallback_app_secret = "app-wide-secret"
"#;
        let config: ConfideConfig = toml::from_str(toml_str).unwrap();

        // Overridden
        assert_eq!(
            config
                .encryption
                .fallback_app_secret
                .as_ref()
                .unwrap()
                .expose_secret(),
            "app-wide-secret"
        );
        // Defaults
        assert!(config.encryption.master_secret.is_none());
        assert_eq!(config.migration.batch_size, 100);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config: ConfideConfig = toml::from_str(
            r#"
[encryption]
master_secret = "hunter2"
"#,
        )
        .unwrap();

        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"), "secret leaked into Debug output");
    }
}
