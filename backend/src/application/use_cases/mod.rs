pub mod page_lookup;
pub mod page_queries;

pub use page_lookup::{FindPage, PageLookup};
pub use page_queries::{ListPages, ViewPage};
