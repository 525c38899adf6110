use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedPlace {
    pub id: i64,
    pub place_name: String,
    pub added_at: String,
}

pub fn get_or_create_saved_place(connection: &Connection, name: &str) -> AppResult<SavedPlace> {
    let name = required_name(name)?;
    if let Some(existing) = find_saved_place(connection, name)? {
        return Ok(existing);
    }

    let inserted = connection.execute(
        "INSERT INTO saved_places (place_name) VALUES (?1)
        ON CONFLICT(place_name) DO NOTHING",
        [name],
    )?;
    if inserted == 0 {
        debug!(target: "saved_places", name, "saved place created concurrently; re-reading");
    } else {
        info!(target: "saved_places", name, "place saved");
    }

    find_saved_place(connection, name)?
        .ok_or_else(|| AppError::NotFound(format!("saved place '{name}'")))
}

pub fn find_saved_place(connection: &Connection, name: &str) -> AppResult<Option<SavedPlace>> {
    connection
        .query_row(
            "SELECT id, place_name, added_at FROM saved_places WHERE place_name = ?1",
            [name],
            saved_place_from_row,
        )
        .optional()
        .map_err(AppError::from)
}

pub fn list_saved_places(connection: &Connection) -> AppResult<Vec<SavedPlace>> {
    let mut stmt =
        connection.prepare("SELECT id, place_name, added_at FROM saved_places ORDER BY id ASC")?;
    let rows = stmt
        .query_map([], saved_place_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn rename_saved_place(
    connection: &Connection,
    current: &str,
    new_name: &str,
) -> AppResult<SavedPlace> {
    let new_name = required_name(new_name)?;
    let existing = find_saved_place(connection, current)?
        .ok_or_else(|| AppError::NotFound(format!("saved place '{current}'")))?;
    if existing.place_name == new_name {
        return Ok(existing);
    }
    if find_saved_place(connection, new_name)?.is_some() {
        return Err(AppError::Conflict(format!("saved place '{new_name}'")));
    }

    connection.execute(
        "UPDATE saved_places SET place_name = ?1 WHERE id = ?2",
        (new_name, existing.id),
    )?;
    info!(target: "saved_places", from = current, to = new_name, "saved place renamed");
    find_saved_place(connection, new_name)?
        .ok_or_else(|| AppError::NotFound(format!("saved place '{new_name}'")))
}

pub fn delete_saved_place(connection: &Connection, name: &str) -> AppResult<()> {
    let affected = connection.execute("DELETE FROM saved_places WHERE place_name = ?1", [name])?;
    if affected == 0 {
        return Err(AppError::NotFound(format!("saved place '{name}'")));
    }
    info!(target: "saved_places", name, "saved place deleted");
    Ok(())
}

fn required_name(name: &str) -> AppResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("place name cannot be empty".into()));
    }
    Ok(trimmed)
}

fn saved_place_from_row(row: &Row<'_>) -> rusqlite::Result<SavedPlace> {
    Ok(SavedPlace {
        id: row.get(0)?,
        place_name: row.get(1)?,
        added_at: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::db::bootstrap;

    #[test]
    fn add_is_idempotent() {
        let dir = tempdir().unwrap();
        let conn = bootstrap(dir.path(), "saved.db").unwrap().connection;

        let first = get_or_create_saved_place(&conn, "Zingerman's").unwrap();
        let second = get_or_create_saved_place(&conn, " Zingerman's ").unwrap();

        assert_eq!(first, second);
        assert_eq!(list_saved_places(&conn).unwrap().len(), 1);
    }

    #[test]
    fn rename_and_delete() {
        let dir = tempdir().unwrap();
        let conn = bootstrap(dir.path(), "rename.db").unwrap().connection;
        get_or_create_saved_place(&conn, "Frita Batidos").unwrap();
        get_or_create_saved_place(&conn, "Jerusalem Garden").unwrap();

        let renamed = rename_saved_place(&conn, "Frita Batidos", "Frita").unwrap();
        assert_eq!(renamed.place_name, "Frita");
        assert!(find_saved_place(&conn, "Frita Batidos").unwrap().is_none());

        assert!(matches!(
            rename_saved_place(&conn, "Frita", "Jerusalem Garden"),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            rename_saved_place(&conn, "Missing", "Other"),
            Err(AppError::NotFound(_))
        ));

        delete_saved_place(&conn, "Frita").unwrap();
        assert!(matches!(
            delete_saved_place(&conn, "Frita"),
            Err(AppError::NotFound(_))
        ));
        assert_eq!(list_saved_places(&conn).unwrap().len(), 1);
    }

    #[test]
    fn rejects_blank_names() {
        let dir = tempdir().unwrap();
        let conn = bootstrap(dir.path(), "blank.db").unwrap().connection;
        assert!(matches!(
            get_or_create_saved_place(&conn, "  "),
            Err(AppError::Validation(_))
        ));
    }
}
