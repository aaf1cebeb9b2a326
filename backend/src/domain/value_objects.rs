/// Value objects for the domain layer
use super::base::{DomainError, DomainResult, ValueObject};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

/// Allowed characters for a page url: a slug with optional `/` separated segments
fn page_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[\p{L}\p{N}_.\-]+(/[\p{L}\p{N}_.\-]+)*$").expect("valid regex")
    })
}

/// Unique identifier for a Page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageId(String);

impl PageId {
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::InvalidValue("PageId cannot be empty".to_string()));
        }
        Ok(PageId(id))
    }

    /// Mint a fresh random token
    pub fn generate() -> Self {
        PageId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for PageId {}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a PageContent revision
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::InvalidValue("ContentId cannot be empty".to_string()));
        }
        Ok(ContentId(id))
    }

    pub fn generate() -> Self {
        ContentId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for ContentId {}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identity of the acting user, handed in by the caller's identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    const ANONYMOUS: &'static str = "anonymous";

    pub fn new(id: impl Into<String>) -> DomainResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidValue("UserId cannot be empty".to_string()));
        }
        Ok(UserId(id))
    }

    /// Identity used when no user is signed in
    pub fn anonymous() -> Self {
        UserId(Self::ANONYMOUS.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for UserId {}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The wiki-relative url of a page, e.g. `alpha` or `guides/setup`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageUrl {
    value: String,
}

impl PageUrl {
    pub fn new(url: impl Into<String>) -> DomainResult<Self> {
        let url = url.into();
        if url.is_empty() {
            return Err(DomainError::InvalidValue("Page url cannot be empty".to_string()));
        }

        if !page_url_pattern().is_match(&url) {
            return Err(DomainError::InvalidValue(format!(
                "Page url contains invalid characters: {}",
                url
            )));
        }

        Ok(PageUrl { value: url })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl ValueObject for PageUrl {}

impl fmt::Display for PageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Markup language of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageType {
    Markdown,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Markdown => "markdown",
        }
    }
}

impl FromStr for PageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markdown" => Ok(PageType::Markdown),
            other => Err(DomainError::InvalidValue(format!(
                "Unsupported page type: {}",
                other
            ))),
        }
    }
}

impl ValueObject for PageType {}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single heading in a table of contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub level: u8,
    pub title: String,
    pub anchor: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    pub fn new(level: u8, title: impl Into<String>, anchor: impl Into<String>) -> Self {
        TocEntry {
            level,
            title: title.into(),
            anchor: anchor.into(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: TocEntry) -> Self {
        self.children.push(child);
        self
    }
}

/// Table of contents derived from a page's content.
///
/// Stored on the page as an encoded blob; [`TableOfContents::encode`] and
/// [`TableOfContents::decode`] own that contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOfContents {
    entries: Vec<TocEntry>,
}

impl TableOfContents {
    pub fn new(entries: Vec<TocEntry>) -> Self {
        TableOfContents { entries }
    }

    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn encode(&self) -> DomainResult<String> {
        serde_json::to_string(self).map_err(|e| DomainError::MalformedToc(e.to_string()))
    }

    pub fn decode(blob: &str) -> DomainResult<Self> {
        serde_json::from_str(blob).map_err(|e| DomainError::MalformedToc(e.to_string()))
    }
}

impl ValueObject for TableOfContents {}

/// A directed "refers to" edge from one page to another
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageLink {
    target: PageId,
    /// Url text as it was written when the link was created
    url: String,
}

impl PageLink {
    pub fn new(target: PageId, url: impl Into<String>) -> Self {
        PageLink {
            target,
            url: url.into(),
        }
    }

    pub fn target(&self) -> &PageId {
        &self.target
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ValueObject for PageLink {}
