use super::page_lookup::{FindPage, PageLookup};
use crate::application::{
    dto::{PageSummary, PageView},
    repositories::{PageRepository, RevisionFilter},
    services::RevisionPolicy,
};
use crate::domain::{base::Entity, value_objects::UserId, DomainResult};

/// Use case for reading a page as a visitor sees it
///
/// Resolves the page and its last published revision. Pages that were never
/// published come back with an empty placeholder draft, see
/// [`PageView::is_placeholder`].
pub struct ViewPage<'a, R: PageRepository> {
    repository: &'a mut R,
}

impl<'a, R: PageRepository> ViewPage<'a, R> {
    pub fn new(repository: &'a mut R) -> Self {
        Self { repository }
    }

    pub fn execute(&mut self, lookup: &PageLookup, actor: &UserId) -> DomainResult<PageView> {
        let page = FindPage::new(&*self.repository).execute(lookup)?;
        let toc = page.toc()?;
        let revision = RevisionPolicy::new(&mut *self.repository).last_published(&page, actor)?;

        Ok(PageView {
            page,
            revision,
            toc,
        })
    }
}

/// Use case for listing all live pages with their publication state
pub struct ListPages<'a, R: PageRepository> {
    repository: &'a R,
}

impl<'a, R: PageRepository> ListPages<'a, R> {
    pub fn new(repository: &'a R) -> Self {
        Self { repository }
    }

    pub fn execute(&self) -> DomainResult<Vec<PageSummary>> {
        let pages = self.repository.find_all()?;
        let mut summaries = Vec::with_capacity(pages.len());

        for page in &pages {
            let published = self
                .repository
                .first_revision(page.id(), RevisionFilter::published())?;
            summaries.push(PageSummary::new(page, published.as_ref()));
        }

        Ok(summaries)
    }
}
