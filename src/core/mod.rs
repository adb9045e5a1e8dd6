pub mod fanout;
pub mod importer;
pub mod migration;
pub mod transform;

pub use crate::domain::model::{LegacyMemberRecord, MemberKind, TargetIdentity};
pub use crate::domain::ports::{IdentityProvider, SourceStore, Storage};
pub use crate::utils::error::Result;
