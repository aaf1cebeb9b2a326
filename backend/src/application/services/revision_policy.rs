/// Revision policy: which revision of a page is authoritative for reading or
/// editing, and when a draft has to be materialized.
use crate::application::repositories::{
    PageRepository, RevisionFilter, RevisionStream, DEFAULT_BATCH_SIZE,
};
use crate::domain::{
    aggregates::Page,
    base::{DomainError, Entity},
    entities::PageContent,
    value_objects::UserId,
    DomainResult,
};
use chrono::Utc;

/// Decides, per page and acting user, which revision to read or edit.
///
/// Every operation takes the acting user explicitly. The policy keeps no
/// state between calls; all state lives in the repository. Repository errors
/// are returned unchanged.
pub struct RevisionPolicy<'a, R: PageRepository> {
    repository: &'a mut R,
    history_batch_size: usize,
}

impl<'a, R: PageRepository> RevisionPolicy<'a, R> {
    pub fn new(repository: &'a mut R) -> Self {
        RevisionPolicy {
            repository,
            history_batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_history_batch_size(mut self, batch_size: usize) -> Self {
        self.history_batch_size = batch_size;
        self
    }

    /// The newest published revision, without side effects.
    pub fn find_published(&self, page: &Page) -> DomainResult<Option<PageContent>> {
        self.repository
            .first_revision(page.id(), RevisionFilter::published())
    }

    /// The newest published revision of `page`.
    ///
    /// A page that has never been published has nothing to return, so an
    /// empty draft owned by `actor` is materialized and returned instead.
    /// Callers must check [`PageContent::is_draft`] on the result. Repeated
    /// calls by the same actor return the same draft.
    ///
    /// If the actor has already written into that draft, the result is the
    /// draft with title and body cleared; unpublished edits never show up here.
    pub fn last_published(&mut self, page: &Page, actor: &UserId) -> DomainResult<PageContent> {
        if let Some(published) = self.find_published(page)? {
            return Ok(published);
        }

        let placeholder = self.materialize_empty_draft(page, actor)?;
        if placeholder.is_blank() {
            Ok(placeholder)
        } else {
            Ok(placeholder.blanked())
        }
    }

    /// The draft `user` is currently editing on `page`.
    ///
    /// When the user has no draft yet, one is created from the last published
    /// revision. Calls without an intervening publish return the same draft.
    pub fn current_draft_for(&mut self, page: &Page, user: &UserId) -> DomainResult<PageContent> {
        if let Some(draft) = self
            .repository
            .first_revision(page.id(), RevisionFilter::drafts_of(user.clone()))?
        {
            return Ok(draft);
        }

        // Nothing published yet: the user's draft is the empty placeholder
        let Some(seed) = self.find_published(page)? else {
            return self.materialize_empty_draft(page, user);
        };

        let draft = PageContent::draft(
            page.id().clone(),
            seed.title(),
            seed.raw_content(),
            user.clone(),
            Utc::now(),
        );
        self.materialize_draft(draft)
    }

    /// Published revisions of `page`, newest first
    pub fn history(&self, page: &Page) -> RevisionStream<'_, R> {
        self.repository
            .list_revisions(page.id(), RevisionFilter::published())
            .with_batch_size(self.history_batch_size)
    }

    /// Every revision of `page`, drafts included, newest first
    pub fn contents(&self, page: &Page) -> RevisionStream<'_, R> {
        self.repository
            .list_revisions(page.id(), RevisionFilter::all())
            .with_batch_size(self.history_batch_size)
    }

    /// Overwrite the title and body of `user`'s draft, creating it first if needed.
    pub fn update_draft(
        &mut self,
        page: &Page,
        user: &UserId,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> DomainResult<PageContent> {
        let mut draft = self.current_draft_for(page, user)?;
        draft.set_title(title);
        draft.set_raw_content(content);
        self.repository.update_revision(&draft)?;

        tracing::debug!("Updated draft {} of page {} for {}", draft.id(), page.id(), user);
        Ok(draft)
    }

    /// Publish `user`'s draft of `page`.
    ///
    /// The draft keeps its identity and becomes the newest published revision.
    /// The page takes over the revision's title and leaves the draft state.
    pub fn publish(&mut self, page: &mut Page, user: &UserId) -> DomainResult<PageContent> {
        let mut draft = self
            .repository
            .first_revision(page.id(), RevisionFilter::drafts_of(user.clone()))?
            .ok_or_else(|| {
                DomainError::NotFound(format!("No draft of page {} for user {}", page.id(), user))
            })?;

        draft.publish(Utc::now());
        *page = self.repository.publish_revision(&draft)?;

        tracing::info!("Published revision {} of page {} by {}", draft.id(), page.id(), user);
        Ok(draft)
    }

    /// Throw away `user`'s draft of `page`. Returns `false` if there was none.
    pub fn discard_draft(&mut self, page: &Page, user: &UserId) -> DomainResult<bool> {
        match self
            .repository
            .first_revision(page.id(), RevisionFilter::drafts_of(user.clone()))?
        {
            Some(draft) => {
                tracing::info!("Discarding draft {} of page {} for {}", draft.id(), page.id(), user);
                self.repository.remove_revision(&draft)
            }
            None => Ok(false),
        }
    }

    fn materialize_empty_draft(&mut self, page: &Page, user: &UserId) -> DomainResult<PageContent> {
        let placeholder = PageContent::empty_draft(page.id().clone(), user.clone(), Utc::now());
        self.materialize_draft(placeholder)
    }

    fn materialize_draft(&mut self, draft: PageContent) -> DomainResult<PageContent> {
        let candidate = draft.id().clone();
        let stored = self.repository.insert_draft_if_absent(draft)?;

        if stored.id() == &candidate {
            tracing::info!(
                "Materialized draft {} of page {} for {}",
                stored.id(),
                stored.page_id(),
                stored.created_by()
            );
        }
        Ok(stored)
    }
}
