pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use config::MigrationConfig;

pub use adapters::{
    csv_source::CsvMemberSource, http_provider::HttpIdentityProvider,
    memory::{InMemoryIdentityProvider, InMemorySource}, storage::LocalStorage,
};
pub use crate::core::{
    fanout::FanoutExecutor,
    importer::{BatchImporter, ImportOutcome},
    migration::{MigrationEngine, MigrationReport, MigrationSettings, TransformErrorPolicy},
};
pub use domain::model::{LegacyMemberRecord, MemberKind, TargetIdentity};
pub use utils::error::{MigrationError, ProviderError, Result, TransformError};
