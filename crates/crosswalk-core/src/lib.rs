use thiserror::Error;

mod edge;
mod finding;
mod framework;
mod snapshot;

pub use edge::{Confidence, EdgeId, EdgeStatus, MappingEdge, NewEdge, RelationshipKind};
pub use finding::{ConsistencyFinding, FindingKind, FindingSubject, Severity};
pub use framework::{FrameworkCode, FrameworkItem, FrameworkPair, ItemKey, ItemStatus};
pub use snapshot::{snapshot_fingerprint, MappingSnapshot};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unsupported framework code: {0}")]
    InvalidFramework(String),
    #[error("malformed item key '{0}', expected FRAMEWORK:ITEM_ID")]
    InvalidItemKey(String),
    #[error("malformed framework pair '{0}', expected CODE:CODE")]
    InvalidPair(String),
    #[error("mapping edge endpoints share framework {0}")]
    SameFramework(FrameworkCode),
    #[error("unknown {what}: {value}")]
    InvalidValue { what: &'static str, value: String },
}
