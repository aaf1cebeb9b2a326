use crate::application::repositories::{PageRepository, RevisionQuery};
use crate::config::{DatabaseLocation, StoreConfig};
use crate::domain::aggregates::Page;
use crate::domain::base::{DomainError, Entity};
use crate::domain::entities::PageContent;
use crate::domain::value_objects::{ContentId, PageId, PageLink, PageType, PageUrl, UserId};
use crate::domain::DomainResult;
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, Result as SqliteResult, Row,
    TransactionBehavior,
};

const PAGE_COLUMNS: &str = "id, url, type, title, toc, draft, deleted_at";
const CONTENT_COLUMNS: &str = "id, page_id, title, content, draft, created_by, created_at";

/// SQLite-based implementation of the PageRepository trait
pub struct SqlitePageRepository {
    conn: Connection,
}

impl SqlitePageRepository {
    /// Create a new SQLite repository with the given connection.
    /// The schema must already be initialized.
    pub fn new(conn: Connection) -> Self {
        SqlitePageRepository { conn }
    }

    /// Create a new in-memory SQLite repository (useful for testing)
    pub fn new_in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::initialize_database(&conn)?;
        Ok(SqlitePageRepository { conn })
    }

    /// Create a new file-based SQLite repository
    pub fn new_with_path(path: impl AsRef<std::path::Path>) -> SqliteResult<Self> {
        let conn = Connection::open(path)?;
        super::schema::initialize_database(&conn)?;
        Ok(SqlitePageRepository { conn })
    }

    /// Open the repository described by `config`
    pub fn open(config: &StoreConfig) -> SqliteResult<Self> {
        let repository = match &config.database {
            DatabaseLocation::InMemory => Self::new_in_memory()?,
            DatabaseLocation::File(path) => Self::new_with_path(path)?,
        };
        repository.conn.busy_timeout(config.busy_timeout)?;

        tracing::info!("Opened page store at {:?}", config.database);
        Ok(repository)
    }

    fn load_page(conn: &Connection, page_id: &PageId) -> DomainResult<Option<Page>> {
        let sql = format!(
            "SELECT {} FROM pages WHERE id = ?1 AND deleted_at IS NULL",
            PAGE_COLUMNS
        );
        let row_result = conn.query_row(&sql, params![page_id.as_str()], PageRow::from_row);

        let row = match row_result {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(store_error(e)),
        };

        let mut page = row.into_page()?;
        for link in Self::load_links(conn, page.id())? {
            page.add_reference(link);
        }
        Ok(Some(page))
    }

    fn load_links(conn: &Connection, page_id: &PageId) -> DomainResult<Vec<PageLink>> {
        let mut stmt = conn
            .prepare(
                "SELECT l.refers_to_page_id, l.url FROM page_links l
                 JOIN pages target ON target.id = l.refers_to_page_id
                 WHERE l.page_id = ?1 AND target.deleted_at IS NULL
                 ORDER BY l.rowid",
            )
            .map_err(store_error)?;

        let links_data: Vec<(String, String)> = stmt
            .query_map(params![page_id.as_str()], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .map_err(store_error)?
            .collect::<SqliteResult<Vec<_>>>()
            .map_err(store_error)?;

        links_data
            .into_iter()
            .map(|(target, url)| Ok(PageLink::new(PageId::new(target)?, url)))
            .collect()
    }

    fn is_live(conn: &Connection, page_id: &PageId) -> DomainResult<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pages WHERE id = ?1 AND deleted_at IS NULL",
                params![page_id.as_str()],
                |row| row.get(0),
            )
            .map_err(store_error)?;
        Ok(count > 0)
    }

    fn ensure_live(conn: &Connection, page_id: &PageId) -> DomainResult<()> {
        if Self::is_live(conn, page_id)? {
            Ok(())
        } else {
            Err(DomainError::NotFound(format!("Page with id {} not found", page_id)))
        }
    }

    /// Fail if a live page other than `except` already owns `url`
    fn ensure_url_free(conn: &Connection, url: &PageUrl, except: Option<&PageId>) -> DomainResult<()> {
        let owner: Option<String> = match conn.query_row(
            "SELECT id FROM pages WHERE url = ?1 AND deleted_at IS NULL",
            params![url.as_str()],
            |row| row.get(0),
        ) {
            Ok(id) => Some(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(store_error(e)),
        };

        match owner {
            Some(id) if except.map_or(true, |own| own.as_str() != id) => {
                tracing::warn!("Rejected duplicate page url {}", url);
                Err(DomainError::DuplicateUrl(url.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn insert_revision(conn: &Connection, revision: &PageContent) -> SqliteResult<usize> {
        conn.execute(
            "INSERT INTO page_contents (id, page_id, title, content, draft, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                revision.id().as_str(),
                revision.page_id().as_str(),
                revision.title(),
                revision.raw_content(),
                revision.is_draft(),
                revision.created_by().as_str(),
                revision.created_at().timestamp_micros(),
            ],
        )
    }

    fn select_draft_of(
        conn: &Connection,
        page_id: &PageId,
        user: &UserId,
    ) -> DomainResult<Option<PageContent>> {
        let sql = format!(
            "SELECT {} FROM page_contents
             WHERE page_id = ?1 AND created_by = ?2 AND draft = 1
             ORDER BY created_at DESC, seq DESC LIMIT 1",
            CONTENT_COLUMNS
        );

        match conn.query_row(
            &sql,
            params![page_id.as_str(), user.as_str()],
            ContentRow::from_row,
        ) {
            Ok(row) => row.into_revision().map(Some),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(store_error(e)),
        }
    }
}

impl PageRepository for SqlitePageRepository {
    fn create(&mut self, url: PageUrl, page_type: PageType) -> DomainResult<Page> {
        let page = Page::new(PageId::generate(), url, page_type);

        let tx = self.conn.transaction().map_err(store_error)?;
        Self::ensure_url_free(&tx, page.url(), None)?;

        tx.execute(
            "INSERT INTO pages (id, url, type, title, toc, draft, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
            params![
                page.id().as_str(),
                page.url().as_str(),
                page.page_type().as_str(),
                page.title(),
                page.toc_blob(),
                page.is_draft(),
            ],
        )
        .map_err(|e| url_error(e, page.url()))?;
        tx.commit().map_err(store_error)?;

        tracing::info!("Created page {} at {}", page.id(), page.url());
        Ok(page)
    }

    fn save(&mut self, page: &Page) -> DomainResult<()> {
        let tx = self.conn.transaction().map_err(store_error)?;
        Self::ensure_live(&tx, page.id())?;
        Self::ensure_url_free(&tx, page.url(), Some(page.id()))?;

        tx.execute(
            "UPDATE pages SET url = ?2, type = ?3, title = ?4, toc = ?5, draft = ?6
             WHERE id = ?1",
            params![
                page.id().as_str(),
                page.url().as_str(),
                page.page_type().as_str(),
                page.title(),
                page.toc_blob(),
                page.is_draft(),
            ],
        )
        .map_err(|e| url_error(e, page.url()))?;

        // Replace outgoing links
        tx.execute(
            "DELETE FROM page_links WHERE page_id = ?1",
            params![page.id().as_str()],
        )
        .map_err(store_error)?;

        for link in page.references() {
            if !Self::is_live(&tx, link.target())? {
                return Err(DomainError::NotFound(format!(
                    "Linked page {} not found",
                    link.target()
                )));
            }

            tx.execute(
                "INSERT OR IGNORE INTO page_links (page_id, refers_to_page_id, url)
                 VALUES (?1, ?2, ?3)",
                params![page.id().as_str(), link.target().as_str(), link.url()],
            )
            .map_err(store_error)?;
        }

        tx.commit().map_err(store_error)?;
        tracing::debug!("Saved page {}", page.id());
        Ok(())
    }

    fn find_by_id(&self, id: &PageId) -> DomainResult<Option<Page>> {
        Self::load_page(&self.conn, id)
    }

    fn find_by_url(&self, url: &PageUrl) -> DomainResult<Option<Page>> {
        let page_id_result: Result<String, _> = self.conn.query_row(
            "SELECT id FROM pages WHERE url = ?1 AND deleted_at IS NULL",
            params![url.as_str()],
            |row| row.get(0),
        );

        let page_id_str = match page_id_result {
            Ok(id) => id,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(store_error(e)),
        };

        let page_id = PageId::new(page_id_str)?;
        self.find_by_id(&page_id)
    }

    fn find_all(&self) -> DomainResult<Vec<Page>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM pages WHERE deleted_at IS NULL ORDER BY url")
            .map_err(store_error)?;

        let page_ids: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .map_err(store_error)?
            .collect::<SqliteResult<Vec<_>>>()
            .map_err(store_error)?;

        let mut pages = Vec::new();
        for id_str in page_ids {
            let page_id = PageId::new(id_str)?;
            if let Some(page) = self.find_by_id(&page_id)? {
                pages.push(page);
            }
        }

        Ok(pages)
    }

    fn delete(&mut self, id: &PageId) -> DomainResult<bool> {
        let tx = self.conn.transaction().map_err(store_error)?;

        let rows_affected = tx
            .execute(
                "UPDATE pages SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
                params![id.as_str(), Utc::now().timestamp_micros()],
            )
            .map_err(store_error)?;

        if rows_affected == 0 {
            return Ok(false);
        }

        // Any failure here drops the transaction and restores the page
        let revisions_removed = tx
            .execute(
                "DELETE FROM page_contents WHERE page_id = ?1",
                params![id.as_str()],
            )
            .map_err(store_error)?;

        tx.commit().map_err(store_error)?;

        tracing::info!("Deleted page {} with {} revisions", id, revisions_removed);
        Ok(true)
    }

    fn fetch_revisions(
        &self,
        page_id: &PageId,
        query: &RevisionQuery,
    ) -> DomainResult<Vec<PageContent>> {
        let mut sql = format!(
            "SELECT {} FROM page_contents WHERE page_id = ?1",
            CONTENT_COLUMNS
        );
        let mut values = vec![Value::Text(page_id.as_str().to_string())];

        if let Some(draft) = query.filter.draft {
            values.push(Value::Integer(draft as i64));
            sql.push_str(&format!(" AND draft = ?{}", values.len()));
        }

        if let Some(user) = &query.filter.created_by {
            values.push(Value::Text(user.as_str().to_string()));
            sql.push_str(&format!(" AND created_by = ?{}", values.len()));
        }

        // A negative LIMIT means no limit in SQLite
        values.push(Value::Integer(query.limit.map_or(-1, |limit| limit as i64)));
        values.push(Value::Integer(query.offset as i64));
        sql.push_str(&format!(
            " ORDER BY created_at DESC, seq DESC LIMIT ?{} OFFSET ?{}",
            values.len() - 1,
            values.len()
        ));

        let mut stmt = self.conn.prepare(&sql).map_err(store_error)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), ContentRow::from_row)
            .map_err(store_error)?
            .collect::<SqliteResult<Vec<_>>>()
            .map_err(store_error)?;

        rows.into_iter().map(ContentRow::into_revision).collect()
    }

    fn add_revision(&mut self, revision: &PageContent) -> DomainResult<()> {
        let tx = self.conn.transaction().map_err(store_error)?;
        Self::ensure_live(&tx, revision.page_id())?;

        Self::insert_revision(&tx, revision).map_err(|e| draft_error(e, revision))?;
        tx.commit().map_err(store_error)?;

        tracing::debug!(
            "Added {} revision {} to page {}",
            if revision.is_draft() { "draft" } else { "published" },
            revision.id(),
            revision.page_id()
        );
        Ok(())
    }

    fn update_revision(&mut self, revision: &PageContent) -> DomainResult<()> {
        let rows_affected = self
            .conn
            .execute(
                "UPDATE page_contents SET title = ?2, content = ?3, draft = ?4, created_at = ?5
                 WHERE id = ?1",
                params![
                    revision.id().as_str(),
                    revision.title(),
                    revision.raw_content(),
                    revision.is_draft(),
                    revision.created_at().timestamp_micros(),
                ],
            )
            .map_err(|e| draft_error(e, revision))?;

        if rows_affected == 0 {
            return Err(DomainError::NotFound(format!(
                "Revision {} not found",
                revision.id()
            )));
        }
        Ok(())
    }

    fn publish_revision(&mut self, revision: &PageContent) -> DomainResult<Page> {
        if revision.is_draft() {
            return Err(DomainError::InvalidValue(format!(
                "Revision {} is still a draft",
                revision.id()
            )));
        }

        let tx = self.conn.transaction().map_err(store_error)?;
        Self::ensure_live(&tx, revision.page_id())?;

        let rows_affected = tx
            .execute(
                "UPDATE page_contents SET title = ?3, content = ?4, draft = 0, created_at = ?5
                 WHERE id = ?1 AND page_id = ?2",
                params![
                    revision.id().as_str(),
                    revision.page_id().as_str(),
                    revision.title(),
                    revision.raw_content(),
                    revision.created_at().timestamp_micros(),
                ],
            )
            .map_err(store_error)?;

        if rows_affected == 0 {
            return Err(DomainError::NotFound(format!(
                "Revision {} not found",
                revision.id()
            )));
        }

        tx.execute(
            "UPDATE pages SET title = ?2, draft = 0 WHERE id = ?1",
            params![revision.page_id().as_str(), revision.title()],
        )
        .map_err(store_error)?;

        let page = Self::load_page(&tx, revision.page_id())?.ok_or_else(|| {
            DomainError::NotFound(format!("Page with id {} not found", revision.page_id()))
        })?;
        tx.commit().map_err(store_error)?;

        tracing::debug!("Stored published revision {} of page {}", revision.id(), page.id());
        Ok(page)
    }

    fn remove_revision(&mut self, revision: &PageContent) -> DomainResult<bool> {
        let rows_affected = self
            .conn
            .execute(
                "DELETE FROM page_contents WHERE id = ?1",
                params![revision.id().as_str()],
            )
            .map_err(store_error)?;

        Ok(rows_affected > 0)
    }

    fn insert_draft_if_absent(&mut self, draft: PageContent) -> DomainResult<PageContent> {
        if !draft.is_draft() {
            return Err(DomainError::InvalidValue(format!(
                "Revision {} is not a draft",
                draft.id()
            )));
        }

        // IMMEDIATE takes the write lock up front, so the insert and the
        // follow-up read see the same state
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(store_error)?;
        Self::ensure_live(&tx, draft.page_id())?;

        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO page_contents
                 (id, page_id, title, content, draft, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
                params![
                    draft.id().as_str(),
                    draft.page_id().as_str(),
                    draft.title(),
                    draft.raw_content(),
                    draft.created_by().as_str(),
                    draft.created_at().timestamp_micros(),
                ],
            )
            .map_err(store_error)?;

        let stored = if inserted == 1 {
            draft
        } else {
            Self::select_draft_of(&tx, draft.page_id(), draft.created_by())?.ok_or_else(|| {
                DomainError::StoreUnavailable(format!(
                    "Draft {} was rejected but no draft of page {} by {} is stored",
                    draft.id(),
                    draft.page_id(),
                    draft.created_by()
                ))
            })?
        };

        tx.commit().map_err(store_error)?;
        Ok(stored)
    }
}

/// Raw `pages` row
struct PageRow {
    id: String,
    url: String,
    page_type: String,
    title: String,
    toc: Option<String>,
    draft: bool,
    deleted_at: Option<i64>,
}

impl PageRow {
    fn from_row(row: &Row<'_>) -> SqliteResult<Self> {
        Ok(PageRow {
            id: row.get(0)?,
            url: row.get(1)?,
            page_type: row.get(2)?,
            title: row.get(3)?,
            toc: row.get(4)?,
            draft: row.get(5)?,
            deleted_at: row.get(6)?,
        })
    }

    fn into_page(self) -> DomainResult<Page> {
        let deleted_at = self.deleted_at.map(timestamp_from_micros).transpose()?;
        Ok(Page::restore(
            PageId::new(self.id)?,
            PageUrl::new(self.url)?,
            self.page_type.parse()?,
            self.title,
            self.toc,
            self.draft,
            deleted_at,
        ))
    }
}

/// Raw `page_contents` row
struct ContentRow {
    id: String,
    page_id: String,
    title: String,
    content: String,
    draft: bool,
    created_by: String,
    created_at: i64,
}

impl ContentRow {
    fn from_row(row: &Row<'_>) -> SqliteResult<Self> {
        Ok(ContentRow {
            id: row.get(0)?,
            page_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            draft: row.get(4)?,
            created_by: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_revision(self) -> DomainResult<PageContent> {
        Ok(PageContent::restore(
            ContentId::new(self.id)?,
            PageId::new(self.page_id)?,
            self.title,
            self.content,
            self.draft,
            UserId::new(self.created_by)?,
            timestamp_from_micros(self.created_at)?,
        ))
    }
}

fn timestamp_from_micros(micros: i64) -> DomainResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        store_error(rusqlite::Error::FromSqlConversionFailure(
            0,
            Type::Integer,
            format!("timestamp out of range: {}", micros).into(),
        ))
    })
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation)
}

fn store_error(e: rusqlite::Error) -> DomainError {
    DomainError::StoreUnavailable(format!("Database error: {}", e))
}

/// Map a uniqueness failure on `pages` to a duplicate url
fn url_error(e: rusqlite::Error, url: &PageUrl) -> DomainError {
    if is_constraint_violation(&e) {
        DomainError::DuplicateUrl(url.to_string())
    } else {
        store_error(e)
    }
}

/// Map a uniqueness failure on `page_contents` to a second draft for the same user
fn draft_error(e: rusqlite::Error, revision: &PageContent) -> DomainError {
    if is_constraint_violation(&e) && revision.is_draft() {
        DomainError::DraftAlreadyExists(format!(
            "{} already has a draft of page {}",
            revision.created_by(),
            revision.page_id()
        ))
    } else {
        store_error(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repositories::RevisionFilter;
    use crate::domain::value_objects::{TableOfContents, TocEntry};
    use chrono::TimeZone;

    fn url(value: &str) -> PageUrl {
        PageUrl::new(value).unwrap()
    }

    fn user(name: &str) -> UserId {
        UserId::new(name).unwrap()
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn create_test_page(repo: &mut SqlitePageRepository, value: &str) -> Page {
        repo.create(url(value), PageType::Markdown).unwrap()
    }

    #[test]
    fn test_create_and_find_by_id() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page = create_test_page(&mut repo, "alpha");

        let loaded = repo.find_by_id(page.id()).unwrap().unwrap();
        assert_eq!(loaded, page);
        assert!(loaded.is_draft());
        assert_eq!(loaded.page_type(), PageType::Markdown);
    }

    #[test]
    fn test_create_duplicate_url() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        create_test_page(&mut repo, "alpha");

        let result = repo.create(url("alpha"), PageType::Markdown);
        assert!(matches!(result, Err(DomainError::DuplicateUrl(_))));
    }

    #[test]
    fn test_get_missing_page() {
        let repo = SqlitePageRepository::new_in_memory().unwrap();
        let result = repo.get(&PageId::new("nonexistent").unwrap());
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[test]
    fn test_find_by_url() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page = create_test_page(&mut repo, "guides/setup");

        let loaded = repo.find_by_url(&url("guides/setup")).unwrap().unwrap();
        assert_eq!(loaded.id(), page.id());
        assert!(repo.find_by_url(&url("nonexistent")).unwrap().is_none());
    }

    #[test]
    fn test_save_updates_attributes() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let mut page = create_test_page(&mut repo, "alpha");

        page.set_title("Alpha");
        page.set_url(url("alpha-renamed"));
        page.set_draft(false);
        repo.save(&page).unwrap();

        let loaded = repo.get(page.id()).unwrap();
        assert_eq!(loaded.title(), "Alpha");
        assert_eq!(loaded.url().as_str(), "alpha-renamed");
        assert!(loaded.is_published());
        assert!(repo.find_by_url(&url("alpha")).unwrap().is_none());
    }

    #[test]
    fn test_save_duplicate_url() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        create_test_page(&mut repo, "alpha");
        let mut beta = create_test_page(&mut repo, "beta");

        beta.set_url(url("alpha"));
        let result = repo.save(&beta);
        assert!(matches!(result, Err(DomainError::DuplicateUrl(_))));
    }

    #[test]
    fn test_save_unknown_page() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page = Page::new(PageId::generate(), url("ghost"), PageType::Markdown);

        assert!(matches!(repo.save(&page), Err(DomainError::NotFound(_))));
    }

    #[test]
    fn test_references_preserved() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let mut alpha = create_test_page(&mut repo, "alpha");
        let beta = create_test_page(&mut repo, "beta");

        alpha.add_reference(PageLink::new(beta.id().clone(), "beta"));
        alpha.add_reference(PageLink::new(beta.id().clone(), "Beta"));
        repo.save(&alpha).unwrap();

        let loaded = repo.get(alpha.id()).unwrap();
        assert_eq!(loaded.references().len(), 2);
        assert_eq!(loaded.references()[0].target(), beta.id());
        assert_eq!(loaded.references()[0].url(), "beta");

        // Saving a page without links replaces the stored ones
        let unlinked = Page::restore(
            alpha.id().clone(),
            alpha.url().clone(),
            alpha.page_type(),
            alpha.title().to_string(),
            None,
            true,
            None,
        );
        repo.save(&unlinked).unwrap();
        assert!(repo.get(alpha.id()).unwrap().references().is_empty());
    }

    #[test]
    fn test_reference_to_unknown_page() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let mut alpha = create_test_page(&mut repo, "alpha");

        alpha.add_reference(PageLink::new(PageId::new("nowhere").unwrap(), "nowhere"));
        assert!(matches!(repo.save(&alpha), Err(DomainError::NotFound(_))));
    }

    #[test]
    fn test_references_to_deleted_page() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let mut alpha = create_test_page(&mut repo, "alpha");
        let beta = create_test_page(&mut repo, "beta");
        let gamma = create_test_page(&mut repo, "gamma");

        alpha.add_reference(PageLink::new(beta.id().clone(), "beta"));
        alpha.add_reference(PageLink::new(gamma.id().clone(), "gamma"));
        repo.save(&alpha).unwrap();

        repo.delete(beta.id()).unwrap();

        // Links to a deleted page are no longer loaded
        let loaded = repo.get(alpha.id()).unwrap();
        assert_eq!(loaded.references().len(), 1);
        assert_eq!(loaded.references()[0].target(), gamma.id());

        // and cannot be stored again
        assert!(matches!(repo.save(&alpha), Err(DomainError::NotFound(_))));
    }

    #[test]
    fn test_toc_round_trip_through_store() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page = create_test_page(&mut repo, "alpha");
        assert!(repo.get_toc(page.id()).unwrap().is_empty());

        let toc = TableOfContents::new(vec![
            TocEntry::new(1, "Intro", "intro").with_child(TocEntry::new(2, "Why", "why")),
        ]);
        repo.set_toc(page.id(), &toc).unwrap();

        assert_eq!(repo.get_toc(page.id()).unwrap(), toc);
    }

    #[test]
    fn test_malformed_toc_blob() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page = create_test_page(&mut repo, "alpha");
        repo.conn
            .execute(
                "UPDATE pages SET toc = 'a:0:{}' WHERE id = ?1",
                params![page.id().as_str()],
            )
            .unwrap();

        let result = repo.get_toc(page.id());
        assert!(matches!(result, Err(DomainError::MalformedToc(_))));
    }

    #[test]
    fn test_find_all_skips_deleted() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        create_test_page(&mut repo, "beta");
        let alpha = create_test_page(&mut repo, "alpha");
        create_test_page(&mut repo, "gamma");

        repo.delete(alpha.id()).unwrap();

        let urls: Vec<String> = repo
            .find_all()
            .unwrap()
            .iter()
            .map(|p| p.url().to_string())
            .collect();
        assert_eq!(urls, vec!["beta", "gamma"]);
    }

    #[test]
    fn test_delete_cascades_to_revisions() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page = create_test_page(&mut repo, "alpha");

        repo.add_revision(&PageContent::published(
            page.id().clone(),
            "v1",
            "",
            user("alice"),
            at(1),
        ))
        .unwrap();
        repo.add_revision(&PageContent::empty_draft(page.id().clone(), user("bob"), at(2)))
            .unwrap();

        assert!(repo.delete(page.id()).unwrap());

        assert!(repo.find_by_id(page.id()).unwrap().is_none());
        let remaining = repo
            .fetch_revisions(page.id(), &RevisionQuery::new(RevisionFilter::all()))
            .unwrap();
        assert!(remaining.is_empty());

        // The row is kept as a tombstone
        let tombstones: i64 = repo
            .conn
            .query_row(
                "SELECT COUNT(*) FROM pages WHERE id = ?1 AND deleted_at IS NOT NULL",
                params![page.id().as_str()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tombstones, 1);
    }

    #[test]
    fn test_delete_nonexistent() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page_id = PageId::new("nonexistent").unwrap();

        assert!(!repo.delete(&page_id).unwrap());
    }

    #[test]
    fn test_delete_twice() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page = create_test_page(&mut repo, "alpha");

        assert!(repo.delete(page.id()).unwrap());
        assert!(!repo.delete(page.id()).unwrap());
    }

    #[test]
    fn test_delete_rolls_back_when_revisions_cannot_be_removed() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page = create_test_page(&mut repo, "alpha");
        repo.add_revision(&PageContent::published(
            page.id().clone(),
            "v1",
            "",
            user("alice"),
            at(1),
        ))
        .unwrap();

        repo.conn
            .execute_batch(
                "CREATE TRIGGER block_revision_delete BEFORE DELETE ON page_contents
                 BEGIN SELECT RAISE(ABORT, 'revisions are locked'); END;",
            )
            .unwrap();

        let result = repo.delete(page.id());
        assert!(matches!(result, Err(DomainError::StoreUnavailable(_))));

        // The page survived together with its revision
        assert!(repo.find_by_id(page.id()).unwrap().is_some());
        let remaining = repo
            .fetch_revisions(page.id(), &RevisionQuery::new(RevisionFilter::all()))
            .unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn test_url_reusable_after_delete() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let old = create_test_page(&mut repo, "alpha");
        repo.delete(old.id()).unwrap();

        let new = create_test_page(&mut repo, "alpha");
        assert_ne!(new.id(), old.id());
        assert_eq!(repo.find_by_url(&url("alpha")).unwrap().unwrap().id(), new.id());
    }

    #[test]
    fn test_fetch_revisions_filters_and_orders() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page = create_test_page(&mut repo, "beta");

        let p1 = PageContent::published(page.id().clone(), "P1", "", user("alice"), at(1));
        let p2 = PageContent::published(page.id().clone(), "P2", "", user("bob"), at(5));
        let p3 = PageContent::published(page.id().clone(), "P3", "", user("alice"), at(3));
        let draft = PageContent::draft(page.id().clone(), "D", "", user("alice"), at(9));
        for revision in [&p1, &p2, &p3, &draft] {
            repo.add_revision(revision).unwrap();
        }

        let published = repo
            .fetch_revisions(page.id(), &RevisionQuery::new(RevisionFilter::published()))
            .unwrap();
        let titles: Vec<&str> = published.iter().map(|r| r.title()).collect();
        assert_eq!(titles, vec!["P2", "P3", "P1"]);

        let by_alice = repo
            .fetch_revisions(
                page.id(),
                &RevisionQuery::new(RevisionFilter::all().with_creator(user("alice"))),
            )
            .unwrap();
        let titles: Vec<&str> = by_alice.iter().map(|r| r.title()).collect();
        assert_eq!(titles, vec!["D", "P3", "P1"]);

        let window = repo
            .fetch_revisions(
                page.id(),
                &RevisionQuery::new(RevisionFilter::all())
                    .with_offset(1)
                    .with_limit(2),
            )
            .unwrap();
        let titles: Vec<&str> = window.iter().map(|r| r.title()).collect();
        assert_eq!(titles, vec!["P2", "P3"]);
    }

    #[test]
    fn test_revision_fields_round_trip() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page = create_test_page(&mut repo, "alpha");
        let created_at = Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap();
        let revision =
            PageContent::draft(page.id().clone(), "Title", "# Body\n", user("alice"), created_at);
        repo.add_revision(&revision).unwrap();

        let loaded = repo
            .first_revision(page.id(), RevisionFilter::drafts_of(user("alice")))
            .unwrap()
            .unwrap();
        assert_eq!(loaded, revision);
    }

    #[test]
    fn test_add_revision_to_missing_page() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let revision = PageContent::empty_draft(PageId::new("missing").unwrap(), user("alice"), at(1));

        assert!(matches!(
            repo.add_revision(&revision),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn test_add_second_draft_rejected() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page = create_test_page(&mut repo, "alpha");

        repo.add_revision(&PageContent::empty_draft(page.id().clone(), user("alice"), at(1)))
            .unwrap();
        let result =
            repo.add_revision(&PageContent::empty_draft(page.id().clone(), user("alice"), at(2)));
        assert!(matches!(result, Err(DomainError::DraftAlreadyExists(_))));

        repo.add_revision(&PageContent::empty_draft(page.id().clone(), user("bob"), at(3)))
            .unwrap();
    }

    #[test]
    fn test_insert_draft_if_absent() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page = create_test_page(&mut repo, "alpha");

        let first = PageContent::draft(page.id().clone(), "mine", "", user("alice"), at(1));
        let stored = repo.insert_draft_if_absent(first.clone()).unwrap();
        assert_eq!(stored, first);

        let second = PageContent::draft(page.id().clone(), "other", "", user("alice"), at(2));
        let stored = repo.insert_draft_if_absent(second).unwrap();
        assert_eq!(stored.id(), first.id());
        assert_eq!(stored.title(), "mine");

        let drafts = repo
            .fetch_revisions(page.id(), &RevisionQuery::new(RevisionFilter::all()))
            .unwrap();
        assert_eq!(drafts.len(), 1);
    }

    #[test]
    fn test_insert_draft_if_absent_rejects_published() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page = create_test_page(&mut repo, "alpha");
        let revision = PageContent::published(page.id().clone(), "", "", user("alice"), at(1));

        assert!(matches!(
            repo.insert_draft_if_absent(revision),
            Err(DomainError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_update_and_remove_revision() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page = create_test_page(&mut repo, "alpha");
        let mut draft = PageContent::empty_draft(page.id().clone(), user("alice"), at(1));
        repo.add_revision(&draft).unwrap();

        draft.set_title("Edited");
        draft.publish(at(10));
        repo.update_revision(&draft).unwrap();

        let loaded = repo
            .first_revision(page.id(), RevisionFilter::published())
            .unwrap()
            .unwrap();
        assert_eq!(loaded.title(), "Edited");
        assert_eq!(loaded.created_at(), at(10));

        assert!(repo.remove_revision(&draft).unwrap());
        assert!(!repo.remove_revision(&draft).unwrap());
        assert!(matches!(
            repo.update_revision(&draft),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn test_publish_revision_updates_page_only_partially() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page = create_test_page(&mut repo, "alpha");
        let toc = TableOfContents::new(vec![TocEntry::new(1, "Intro", "intro")]);
        repo.set_toc(page.id(), &toc).unwrap();

        let mut draft = PageContent::draft(page.id().clone(), "Alpha", "body", user("alice"), at(1));
        repo.add_revision(&draft).unwrap();

        assert!(matches!(
            repo.publish_revision(&draft),
            Err(DomainError::InvalidValue(_))
        ));

        draft.publish(at(2));
        let stored = repo.publish_revision(&draft).unwrap();
        assert_eq!(stored.title(), "Alpha");
        assert!(stored.is_published());
        assert_eq!(stored.toc().unwrap(), toc);

        let loaded = repo
            .first_revision(page.id(), RevisionFilter::published())
            .unwrap()
            .unwrap();
        assert_eq!(loaded.id(), draft.id());
        assert_eq!(loaded.created_at(), at(2));
    }

    #[test]
    fn test_publish_revision_rolls_back_when_page_cannot_be_updated() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page = create_test_page(&mut repo, "alpha");
        let mut draft = PageContent::draft(page.id().clone(), "Alpha", "body", user("alice"), at(1));
        repo.add_revision(&draft).unwrap();

        repo.conn
            .execute_batch(
                "CREATE TRIGGER block_page_update BEFORE UPDATE ON pages
                 BEGIN SELECT RAISE(ABORT, 'pages are locked'); END;",
            )
            .unwrap();

        draft.publish(at(2));
        let result = repo.publish_revision(&draft);
        assert!(matches!(result, Err(DomainError::StoreUnavailable(_))));

        // The revision is still a draft and the page is unchanged
        assert!(repo
            .first_revision(page.id(), RevisionFilter::published())
            .unwrap()
            .is_none());
        assert!(repo
            .first_revision(page.id(), RevisionFilter::drafts_of(user("alice")))
            .unwrap()
            .is_some());
        assert!(repo.get(page.id()).unwrap().is_draft());
    }

    #[test]
    fn test_publish_revision_of_deleted_page() {
        let mut repo = SqlitePageRepository::new_in_memory().unwrap();
        let page = create_test_page(&mut repo, "alpha");
        let mut draft = PageContent::empty_draft(page.id().clone(), user("alice"), at(1));
        repo.add_revision(&draft).unwrap();
        repo.delete(page.id()).unwrap();

        draft.publish(at(2));
        assert!(matches!(
            repo.publish_revision(&draft),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn test_concurrent_draft_creation_yields_one_draft() {
        use crate::application::services::RevisionPolicy;
        use std::sync::{Arc, Barrier};
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::with_path(dir.path().join("wiki.db"));

        let mut setup = SqlitePageRepository::open(&config).unwrap();
        let page = create_test_page(&mut setup, "contested");
        setup
            .add_revision(&PageContent::published(
                page.id().clone(),
                "Published",
                "published body",
                user("author"),
                at(1),
            ))
            .unwrap();

        // Both connections are opened before either races
        let first = SqlitePageRepository::open(&config).unwrap();
        let second = SqlitePageRepository::open(&config).unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [first, second]
            .into_iter()
            .map(|mut repo| {
                let barrier = Arc::clone(&barrier);
                let page = page.clone();
                thread::spawn(move || {
                    barrier.wait();
                    RevisionPolicy::new(&mut repo)
                        .current_draft_for(&page, &user("alice"))
                        .unwrap()
                })
            })
            .collect();

        let drafts: Vec<PageContent> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(drafts[0].id(), drafts[1].id());
        assert_eq!(drafts[0].title(), "Published");

        let stored: i64 = setup
            .conn
            .query_row(
                "SELECT COUNT(*) FROM page_contents WHERE page_id = ?1 AND draft = 1",
                params![page.id().as_str()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stored, 1);
    }

    #[test]
    fn test_concurrent_placeholder_creation_yields_one_draft() {
        use crate::application::services::RevisionPolicy;
        use std::sync::{Arc, Barrier};
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::with_path(dir.path().join("wiki.db"));

        let mut setup = SqlitePageRepository::open(&config).unwrap();
        let page = create_test_page(&mut setup, "unpublished");

        let first = SqlitePageRepository::open(&config).unwrap();
        let second = SqlitePageRepository::open(&config).unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = [first, second]
            .into_iter()
            .map(|mut repo| {
                let barrier = Arc::clone(&barrier);
                let page = page.clone();
                thread::spawn(move || {
                    barrier.wait();
                    RevisionPolicy::new(&mut repo)
                        .current_draft_for(&page, &user("alice"))
                        .unwrap()
                })
            })
            .collect();

        let drafts: Vec<PageContent> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(drafts[0].id(), drafts[1].id());

        let stored = setup
            .fetch_revisions(page.id(), &RevisionQuery::new(RevisionFilter::all()))
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id(), drafts[0].id());
    }

    #[test]
    fn test_open_with_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wiki.db");
        let config = StoreConfig::with_path(&path);

        let page_id = {
            let mut repo = SqlitePageRepository::open(&config).unwrap();
            create_test_page(&mut repo, "persisted").id().clone()
        };

        let repo = SqlitePageRepository::open(&config).unwrap();
        assert!(repo.find_by_id(&page_id).unwrap().is_some());
    }
}
