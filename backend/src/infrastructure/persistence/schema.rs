use rusqlite::{Connection, Result};

/// Initialize the SQLite database with the required schema.
/// This function is idempotent and can be safely called multiple times.
pub fn initialize_database(conn: &Connection) -> Result<()> {
    // Enable foreign key constraints
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    // Pages are soft-deleted: `deleted_at` holds the deletion time in
    // microseconds since the epoch
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pages (
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            type TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            toc TEXT,
            draft INTEGER NOT NULL DEFAULT 1,
            deleted_at INTEGER
        )",
        [],
    )?;

    // Urls are unique among live pages only
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_pages_live_url
         ON pages(url) WHERE deleted_at IS NULL",
        [],
    )?;

    // `seq` records insertion order and breaks ties between equal timestamps
    conn.execute(
        "CREATE TABLE IF NOT EXISTS page_contents (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            page_id TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            draft INTEGER NOT NULL,
            created_by TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contents_page_created
         ON page_contents(page_id, draft, created_at DESC, seq DESC)",
        [],
    )?;

    // At most one draft per user and page
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_contents_user_draft
         ON page_contents(page_id, created_by) WHERE draft = 1",
        [],
    )?;

    // Outgoing "refers to" links with the url text used at link time
    conn.execute(
        "CREATE TABLE IF NOT EXISTS page_links (
            page_id TEXT NOT NULL,
            refers_to_page_id TEXT NOT NULL,
            url TEXT NOT NULL,
            PRIMARY KEY (page_id, refers_to_page_id, url),
            FOREIGN KEY (page_id) REFERENCES pages(id) ON DELETE CASCADE,
            FOREIGN KEY (refers_to_page_id) REFERENCES pages(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_links_target ON page_links(refers_to_page_id)",
        [],
    )?;

    Ok(())
}
