use rusqlite::{Connection, Result};

/// Initialize the media index schema
pub fn init_index_schema(conn: &Connection) -> Result<()> {
    // Schema version table for the media index
    conn.execute(
        "CREATE TABLE IF NOT EXISTS media_schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT version FROM media_schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        create_index_schema_v1(conn)?;
        conn.execute("INSERT INTO media_schema_version (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Create media index schema version 1
///
/// Column names follow the platform media index so rows read the same on
/// every backend.
fn create_index_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS images (
            _id INTEGER PRIMARY KEY AUTOINCREMENT,
            _display_name TEXT,
            relative_path TEXT,
            _data TEXT,
            mime_type TEXT,
            _size INTEGER,
            date_added INTEGER NOT NULL,
            is_pending INTEGER NOT NULL DEFAULT 0 CHECK(is_pending IN (0,1))
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_images_relative_path ON images(relative_path)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_images_date_added ON images(date_added DESC)",
        [],
    )?;

    Ok(())
}
