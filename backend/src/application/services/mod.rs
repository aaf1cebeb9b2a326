pub mod revision_policy;

pub use revision_policy::RevisionPolicy;
