/// Domain entities
use super::base::Entity;
use super::value_objects::{ContentId, PageId, UserId};
use chrono::{DateTime, Utc};

/// One version of a page's title and body.
///
/// A revision is either published (`draft == false`) or a draft owned by the
/// user who created it. The newest published revision of a page is the one
/// readers see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    id: ContentId,
    page_id: PageId,
    title: String,
    content: String,
    draft: bool,
    created_by: UserId,
    created_at: DateTime<Utc>,
}

impl PageContent {
    /// Create a new published revision
    pub fn published(
        page_id: PageId,
        title: impl Into<String>,
        content: impl Into<String>,
        created_by: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        PageContent {
            id: ContentId::generate(),
            page_id,
            title: title.into(),
            content: content.into(),
            draft: false,
            created_by,
            created_at,
        }
    }

    /// Create a new draft revision
    pub fn draft(
        page_id: PageId,
        title: impl Into<String>,
        content: impl Into<String>,
        created_by: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        PageContent {
            id: ContentId::generate(),
            page_id,
            title: title.into(),
            content: content.into(),
            draft: true,
            created_by,
            created_at,
        }
    }

    /// Create an empty draft, used when a page has nothing to show yet
    pub fn empty_draft(page_id: PageId, created_by: UserId, created_at: DateTime<Utc>) -> Self {
        Self::draft(page_id, "", "", created_by, created_at)
    }

    /// Rebuild a revision from stored fields
    pub fn restore(
        id: ContentId,
        page_id: PageId,
        title: String,
        content: String,
        draft: bool,
        created_by: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        PageContent {
            id,
            page_id,
            title,
            content,
            draft,
            created_by,
            created_at,
        }
    }

    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// The unrendered markup body
    pub fn raw_content(&self) -> &str {
        &self.content
    }

    pub fn is_draft(&self) -> bool {
        self.draft
    }

    pub fn is_published(&self) -> bool {
        !self.draft
    }

    pub fn created_by(&self) -> &UserId {
        &self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether this is a draft owned by `user`
    pub fn is_draft_of(&self, user: &UserId) -> bool {
        self.draft && &self.created_by == user
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_raw_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    /// Whether both title and body are blank
    pub fn is_blank(&self) -> bool {
        self.title.is_empty() && self.content.is_empty()
    }

    /// The same revision with title and body cleared. Not meant to be stored.
    pub fn blanked(&self) -> Self {
        PageContent {
            title: String::new(),
            content: String::new(),
            ..self.clone()
        }
    }

    /// Turn a draft into a published revision stamped at `published_at`
    pub fn publish(&mut self, published_at: DateTime<Utc>) {
        self.draft = false;
        self.created_at = published_at;
    }
}

impl Entity for PageContent {
    type Id = ContentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
