/// Base DDD abstractions for the domain layer
use std::fmt::Debug;
use thiserror::Error;

/// Trait for value objects - immutable objects defined by their attributes
/// Value objects are equal if all their attributes are equal
pub trait ValueObject: Clone + PartialEq + Eq + Debug {}

/// Trait for entities - objects with identity that can change over time
/// Entities are equal if their IDs are equal, regardless of other attributes
pub trait Entity: Debug {
    type Id: ValueObject;

    fn id(&self) -> &Self::Id;
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid value provided
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// No live row matches the given token or url
    #[error("Not found: {0}")]
    NotFound(String),

    /// Another live page already owns the url
    #[error("Duplicate url: {0}")]
    DuplicateUrl(String),

    /// The table-of-contents blob could not be encoded or decoded
    #[error("Malformed table of contents: {0}")]
    MalformedToc(String),

    /// The user already has a draft for this page
    #[error("Draft already exists: {0}")]
    DraftAlreadyExists(String),

    /// The storage collaborator failed
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}
