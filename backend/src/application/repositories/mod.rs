pub mod page_repository;
pub mod revision_stream;

pub use page_repository::{PageRepository, RevisionFilter, RevisionQuery};
pub use revision_stream::{RevisionStream, DEFAULT_BATCH_SIZE};
