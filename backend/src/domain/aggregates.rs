/// Domain aggregates
use super::base::{DomainResult, Entity};
use super::value_objects::{PageId, PageLink, PageType, PageUrl, TableOfContents};
use chrono::{DateTime, Utc};

/// A Page is the aggregate root of a wiki article.
///
/// It carries the page-level attributes (url, type, title, table of contents,
/// draft flag) and the page's outgoing reference links. Revisions of the
/// page's content are separate [`PageContent`](super::entities::PageContent)
/// entities reached through the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    id: PageId,
    url: PageUrl,
    page_type: PageType,
    title: String,
    toc: Option<String>,
    draft: bool,
    deleted_at: Option<DateTime<Utc>>,
    references: Vec<PageLink>,
}

impl Page {
    /// Create a new page. Pages start as drafts with no title and no toc.
    pub fn new(id: PageId, url: PageUrl, page_type: PageType) -> Self {
        Page {
            id,
            url,
            page_type,
            title: String::new(),
            toc: None,
            draft: true,
            deleted_at: None,
            references: Vec::new(),
        }
    }

    /// Rebuild a page from stored fields. The toc is kept encoded.
    pub fn restore(
        id: PageId,
        url: PageUrl,
        page_type: PageType,
        title: String,
        toc: Option<String>,
        draft: bool,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Self {
        Page {
            id,
            url,
            page_type,
            title,
            toc,
            draft,
            deleted_at,
            references: Vec::new(),
        }
    }

    pub fn url(&self) -> &PageUrl {
        &self.url
    }

    pub fn set_url(&mut self, url: PageUrl) {
        self.url = url;
    }

    pub fn page_type(&self) -> PageType {
        self.page_type
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn is_draft(&self) -> bool {
        self.draft
    }

    pub fn is_published(&self) -> bool {
        !self.draft
    }

    pub fn set_draft(&mut self, draft: bool) {
        self.draft = draft;
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Decode the table of contents. A page whose toc was never set has an
    /// empty one.
    pub fn toc(&self) -> DomainResult<TableOfContents> {
        match &self.toc {
            Some(blob) => TableOfContents::decode(blob),
            None => Ok(TableOfContents::default()),
        }
    }

    /// Encode and store the table of contents
    pub fn set_toc(&mut self, toc: &TableOfContents) -> DomainResult<()> {
        self.toc = Some(toc.encode()?);
        Ok(())
    }

    /// The encoded toc exactly as persisted
    pub fn toc_blob(&self) -> Option<&str> {
        self.toc.as_deref()
    }

    pub fn references(&self) -> &[PageLink] {
        &self.references
    }

    /// Record that this page links to `target` through `url`.
    /// Links are unique per target and url text.
    pub fn add_reference(&mut self, link: PageLink) {
        if !self.references.contains(&link) {
            self.references.push(link);
        }
    }
}

impl Entity for Page {
    type Id = PageId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
