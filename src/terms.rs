use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, trace};

use crate::errors::{AppError, AppResult};
use crate::places::{self, Place};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchTerm {
    pub id: i64,
    pub term: String,
    pub created_at: String,
}

/// Returns the term row for `text`, inserting it first if absent.
///
/// The insert ignores uniqueness conflicts and the row is re-read afterwards,
/// so a writer that loses a race returns the winner's row instead of failing.
pub fn get_or_create_term(connection: &Connection, text: &str) -> AppResult<SearchTerm> {
    if let Some(existing) = find_term(connection, text)? {
        trace!(target: "terms", term = text, id = existing.id, "search term reused");
        return Ok(existing);
    }

    let inserted = connection.execute(
        "INSERT INTO search_terms (term) VALUES (?1)
        ON CONFLICT(term) DO NOTHING",
        [text],
    )?;
    if inserted == 0 {
        debug!(target: "terms", term = text, "search term created concurrently; re-reading");
    }

    find_term(connection, text)?
        .ok_or_else(|| AppError::NotFound(format!("search term '{text}'")))
}

pub fn find_term(connection: &Connection, text: &str) -> AppResult<Option<SearchTerm>> {
    connection
        .query_row(
            "SELECT id, term, created_at FROM search_terms WHERE term = ?1",
            [text],
            term_from_row,
        )
        .optional()
        .map_err(AppError::from)
}

pub fn list_terms(connection: &Connection) -> AppResult<Vec<SearchTerm>> {
    let mut stmt =
        connection.prepare("SELECT id, term, created_at FROM search_terms ORDER BY id ASC")?;
    let rows = stmt
        .query_map([], term_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Places first discovered under `text`. Unknown terms are reported as
/// missing rather than as an empty list.
pub fn places_for_term(connection: &Connection, text: &str) -> AppResult<Vec<Place>> {
    let term = find_term(connection, text)?
        .ok_or_else(|| AppError::NotFound(format!("search term '{text}'")))?;
    places::places_owned_by(connection, term.id)
}

fn term_from_row(row: &Row<'_>) -> rusqlite::Result<SearchTerm> {
    Ok(SearchTerm {
        id: row.get(0)?,
        term: row.get(1)?,
        created_at: row.get(2)?,
    })
}
