use rusqlite::Connection;
use std::path::Path;

/// Open the workspace's attendance store. The store is owned by the host
/// app's sync layer; this engine only reads it, so no schema is created
/// here. A store with none of the candidate tables simply resolves as a
/// failed fetch chain downstream.
pub fn open_store(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("school.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    Ok(conn)
}
