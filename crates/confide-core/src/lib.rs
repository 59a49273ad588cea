//! confide-core: shared configuration schema for the Confide
//! message-confidentiality toolkit.

pub mod config;

pub use config::{ConfideConfig, EncryptionConfig, MigrationConfig};
