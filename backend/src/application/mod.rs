pub mod dto;
pub mod repositories;
pub mod services;
pub mod use_cases;

pub use dto::{PageSummary, PageView};
pub use repositories::{PageRepository, RevisionFilter, RevisionQuery, RevisionStream};
pub use services::RevisionPolicy;
pub use use_cases::{FindPage, ListPages, PageLookup, ViewPage};
