use crate::domain::{
    aggregates::Page,
    base::Entity,
    entities::PageContent,
    value_objects::{PageId, PageUrl, TableOfContents},
};
use chrono::{DateTime, Utc};

/// A page together with the revision a reader should see
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub page: Page,
    pub revision: PageContent,
    pub toc: TableOfContents,
}

impl PageView {
    /// True when the page has never been published and `revision` is the
    /// empty draft standing in for it
    pub fn is_placeholder(&self) -> bool {
        self.revision.is_draft()
    }
}

/// Listing entry for a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSummary {
    pub page_id: PageId,
    pub url: PageUrl,
    pub title: String,
    pub draft: bool,
    /// Creation time of the newest published revision
    pub last_published_at: Option<DateTime<Utc>>,
}

impl PageSummary {
    pub fn new(page: &Page, last_published: Option<&PageContent>) -> Self {
        Self {
            page_id: page.id().clone(),
            url: page.url().clone(),
            title: page.title().to_string(),
            draft: page.is_draft(),
            last_published_at: last_published.map(|r| r.created_at()),
        }
    }
}
