use super::revision_stream::RevisionStream;
use crate::domain::{
    aggregates::Page,
    entities::PageContent,
    value_objects::{PageId, PageType, PageUrl, TableOfContents, UserId},
    DomainError, DomainResult,
};

/// Restricts which revisions of a page a query returns.
///
/// An empty filter matches every revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionFilter {
    pub draft: Option<bool>,
    pub created_by: Option<UserId>,
}

impl RevisionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Published (non-draft) revisions only
    pub fn published() -> Self {
        Self {
            draft: Some(false),
            created_by: None,
        }
    }

    /// Drafts owned by `user`
    pub fn drafts_of(user: UserId) -> Self {
        Self {
            draft: Some(true),
            created_by: Some(user),
        }
    }

    pub fn with_draft(mut self, draft: bool) -> Self {
        self.draft = Some(draft);
        self
    }

    pub fn with_creator(mut self, user: UserId) -> Self {
        self.created_by = Some(user);
        self
    }

    pub fn matches(&self, revision: &PageContent) -> bool {
        self.draft.map_or(true, |draft| revision.is_draft() == draft)
            && self
                .created_by
                .as_ref()
                .map_or(true, |user| revision.created_by() == user)
    }
}

/// One window over a page's revisions, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionQuery {
    pub filter: RevisionFilter,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl RevisionQuery {
    pub fn new(filter: RevisionFilter) -> Self {
        Self {
            filter,
            offset: 0,
            limit: None,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The first matching revision only
    pub fn first(filter: RevisionFilter) -> Self {
        Self::new(filter).with_limit(1)
    }
}

/// Repository trait for managing Page aggregates and their content revisions.
///
/// Revisions returned by queries are ordered by creation time, newest first.
/// Revisions with equal timestamps come back in reverse insertion order, so
/// the most recently stored one wins.
///
/// Soft-deleted pages behave as if they did not exist.
pub trait PageRepository {
    /// Creates and persists a new page.
    ///
    /// Fails with [`DomainError::DuplicateUrl`] if a live page already uses `url`.
    fn create(&mut self, url: PageUrl, page_type: PageType) -> DomainResult<Page>;

    /// Saves the page's attributes and outgoing links.
    ///
    /// Fails with [`DomainError::DuplicateUrl`] if another live page owns the
    /// url, or [`DomainError::NotFound`] if the page does not exist.
    fn save(&mut self, page: &Page) -> DomainResult<()>;

    /// Finds a page by its unique identifier.
    ///
    /// Returns `Ok(Some(page))` if found, `Ok(None)` if not found,
    /// or an error if the operation fails.
    fn find_by_id(&self, id: &PageId) -> DomainResult<Option<Page>>;

    /// Finds a live page by its url.
    fn find_by_url(&self, url: &PageUrl) -> DomainResult<Option<Page>>;

    /// Returns all live pages ordered by url.
    fn find_all(&self) -> DomainResult<Vec<Page>>;

    /// Soft-deletes a page and removes all of its revisions in one transaction.
    ///
    /// Returns `Ok(true)` if the page was deleted, `Ok(false)` if the page
    /// was not found, or an error if the operation fails.
    fn delete(&mut self, id: &PageId) -> DomainResult<bool>;

    /// Fetches one window of the page's revisions.
    fn fetch_revisions(&self, page_id: &PageId, query: &RevisionQuery)
        -> DomainResult<Vec<PageContent>>;

    /// Persists a new revision.
    ///
    /// Fails with [`DomainError::NotFound`] if the page does not exist and with
    /// [`DomainError::DraftAlreadyExists`] if the revision is a draft and its
    /// creator already has one for this page.
    fn add_revision(&mut self, revision: &PageContent) -> DomainResult<()>;

    /// Persists changes to an existing revision.
    fn update_revision(&mut self, revision: &PageContent) -> DomainResult<()>;

    /// Stores `revision` as published and, in the same transaction, gives the
    /// page the revision's title and clears its draft flag. Other page
    /// attributes are left as stored. Returns the page as stored afterwards.
    ///
    /// Fails with [`DomainError::NotFound`] if the page or the revision is
    /// missing, and with [`DomainError::InvalidValue`] if `revision` is still
    /// a draft.
    fn publish_revision(&mut self, revision: &PageContent) -> DomainResult<Page>;

    /// Removes a single revision. Returns `Ok(false)` if it did not exist.
    fn remove_revision(&mut self, revision: &PageContent) -> DomainResult<bool>;

    /// Atomically stores `draft` unless its creator already has a draft for
    /// the page, and returns whichever draft is stored afterwards.
    fn insert_draft_if_absent(&mut self, draft: PageContent) -> DomainResult<PageContent>;

    /// Loads a page, failing with [`DomainError::NotFound`] if it is missing.
    fn get(&self, id: &PageId) -> DomainResult<Page> {
        self.find_by_id(id)?
            .ok_or_else(|| DomainError::NotFound(format!("Page with id {} not found", id)))
    }

    /// Lazily walks the page's revisions matching `filter`, newest first.
    fn list_revisions(&self, page_id: &PageId, filter: RevisionFilter) -> RevisionStream<'_, Self>
    where
        Self: Sized,
    {
        RevisionStream::new(self, page_id.clone(), filter)
    }

    /// The newest revision matching `filter`, if any.
    fn first_revision(
        &self,
        page_id: &PageId,
        filter: RevisionFilter,
    ) -> DomainResult<Option<PageContent>> {
        let mut window = self.fetch_revisions(page_id, &RevisionQuery::first(filter))?;
        Ok(if window.is_empty() {
            None
        } else {
            Some(window.swap_remove(0))
        })
    }

    /// Decodes the stored table of contents of a page.
    fn get_toc(&self, page_id: &PageId) -> DomainResult<TableOfContents> {
        self.get(page_id)?.toc()
    }

    /// Encodes and stores a new table of contents for a page.
    fn set_toc(&mut self, page_id: &PageId, toc: &TableOfContents) -> DomainResult<()> {
        let mut page = self.get(page_id)?;
        page.set_toc(toc)?;
        self.save(&page)
    }
}
