use crate::application::repositories::PageRepository;
use crate::domain::{
    aggregates::Page,
    value_objects::{PageId, PageUrl},
    DomainError, DomainResult,
};
use std::fmt;

/// How a caller identifies a page: by its token or by its url
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLookup {
    Token(PageId),
    Url(PageUrl),
}

impl fmt::Display for PageLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageLookup::Token(id) => write!(f, "token {}", id),
            PageLookup::Url(url) => write!(f, "url {}", url),
        }
    }
}

/// Use case for resolving a page by token or url
pub struct FindPage<'a, R: PageRepository> {
    repository: &'a R,
}

impl<'a, R: PageRepository> FindPage<'a, R> {
    pub fn new(repository: &'a R) -> Self {
        Self { repository }
    }

    /// Load the live page matching `lookup`, or fail with `NotFound`
    pub fn execute(&self, lookup: &PageLookup) -> DomainResult<Page> {
        let page = match lookup {
            PageLookup::Token(id) => self.repository.find_by_id(id)?,
            PageLookup::Url(url) => self.repository.find_by_url(url)?,
        };

        page.ok_or_else(|| DomainError::NotFound(format!("Page with {} not found", lookup)))
    }
}
