use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, trace};

use crate::errors::{AppError, AppResult};
use crate::places_api::Rating;
use crate::terms::get_or_create_term;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    pub id: i64,
    pub business: String,
    pub location: String,
    pub rating: Rating,
    pub search_term_id: i64,
    pub discovered_at: String,
}

/// A discovered place joined with the text of the term that owns it.
#[derive(Debug, Clone, Serialize)]
pub struct PlaceListing {
    #[serde(flatten)]
    pub place: Place,
    pub term: String,
}

#[derive(Debug, Clone)]
pub struct UpsertedPlace {
    pub place: Place,
    pub created: bool,
}

/// Finds a place by business name or creates it under `owner_term`.
///
/// An existing row is returned untouched: a rediscovered business keeps its
/// first location, rating and owning term.
pub fn upsert_place(
    connection: &Connection,
    business: &str,
    location: &str,
    rating: Rating,
    owner_term: &str,
) -> AppResult<UpsertedPlace> {
    if let Some(place) = find_place_by_name(connection, business)? {
        trace!(target: "places", business, id = place.id, "place already known");
        return Ok(UpsertedPlace {
            place,
            created: false,
        });
    }

    let term = get_or_create_term(connection, owner_term)?;
    let inserted = connection.execute(
        "INSERT INTO places (business, location, rating, search_term_id)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(business) DO NOTHING",
        (business, location, rating.as_column(), term.id),
    )?;
    if inserted == 0 {
        debug!(target: "places", business, "place created concurrently; re-reading");
    }

    let place = find_place_by_name(connection, business)?
        .ok_or_else(|| AppError::NotFound(format!("place '{business}'")))?;
    Ok(UpsertedPlace {
        place,
        created: inserted > 0,
    })
}

pub fn find_place_by_name(connection: &Connection, business: &str) -> AppResult<Option<Place>> {
    connection
        .query_row(
            "SELECT id, business, location, rating, search_term_id, discovered_at
            FROM places
            WHERE business = ?1",
            [business],
            place_from_row,
        )
        .optional()
        .map_err(AppError::from)
}

pub fn list_places(connection: &Connection) -> AppResult<Vec<PlaceListing>> {
    let mut stmt = connection.prepare(
        "SELECT p.id, p.business, p.location, p.rating, p.search_term_id, p.discovered_at, t.term
        FROM places p
        JOIN search_terms t ON t.id = p.search_term_id
        ORDER BY p.id ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PlaceListing {
                place: place_from_row(row)?,
                term: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn places_owned_by(connection: &Connection, term_id: i64) -> AppResult<Vec<Place>> {
    let mut stmt = connection.prepare(
        "SELECT id, business, location, rating, search_term_id, discovered_at
        FROM places
        WHERE search_term_id = ?1
        ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map([term_id], place_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_places(connection: &Connection) -> AppResult<usize> {
    let count: i64 = connection.query_row("SELECT COUNT(*) FROM places", [], |row| row.get(0))?;
    Ok(count.max(0) as usize)
}

fn place_from_row(row: &Row<'_>) -> rusqlite::Result<Place> {
    let rating: Option<f64> = row.get(3)?;
    Ok(Place {
        id: row.get(0)?,
        business: row.get(1)?,
        location: row.get(2)?,
        rating: Rating::from_column(rating),
        search_term_id: row.get(4)?,
        discovered_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use tempfile::tempdir;

    use super::*;
    use crate::db::{bootstrap, open_connection};
    use crate::terms::{find_term, places_for_term};

    #[test]
    fn upsert_keeps_first_observation() {
        let dir = tempdir().unwrap();
        let conn = bootstrap(dir.path(), "places.db").unwrap().connection;

        let first = upsert_place(&conn, "Pizza House", "Main St", Rating::Score(4.5), "pizza")
            .unwrap();
        let second = upsert_place(&conn, "Pizza House", "Elm St", Rating::Score(2.0), "pizza")
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.place, second.place);
        assert_eq!(second.place.location, "Main St");
        assert_eq!(second.place.rating, Rating::Score(4.5));
        assert_eq!(count_places(&conn).unwrap(), 1);
    }

    #[test]
    fn rediscovery_under_other_term_keeps_owner() {
        let dir = tempdir().unwrap();
        let conn = bootstrap(dir.path(), "owner.db").unwrap().connection;

        let original = upsert_place(&conn, "Noodle Bar", "State St", Rating::Missing, "ramen")
            .unwrap()
            .place;
        let again = upsert_place(&conn, "Noodle Bar", "State St", Rating::Missing, "noodles")
            .unwrap()
            .place;

        let ramen = find_term(&conn, "ramen").unwrap().unwrap();
        assert_eq!(again.search_term_id, ramen.id);
        assert_eq!(original.id, again.id);
        // owner lookup happens only on insert
        assert!(find_term(&conn, "noodles").unwrap().is_none());
        assert_eq!(places_for_term(&conn, "ramen").unwrap().len(), 1);
    }

    #[test]
    fn missing_rating_is_stored_as_null() {
        let dir = tempdir().unwrap();
        let conn = bootstrap(dir.path(), "null.db").unwrap().connection;

        upsert_place(&conn, "Quiet Cafe", "Huron St", Rating::Missing, "coffee").unwrap();
        let raw: Option<f64> = conn
            .query_row(
                "SELECT rating FROM places WHERE business = 'Quiet Cafe'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(raw.is_none());

        let listing = list_places(&conn).unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].term, "coffee");
        assert!(listing[0].place.rating.is_missing());
    }

    #[test]
    fn concurrent_upserts_share_one_row() {
        let dir = tempdir().unwrap();
        let ctx = bootstrap(dir.path(), "place-race.db").unwrap();
        let path = ctx.path.clone();

        let workers = 4;
        let barrier = Arc::new(Barrier::new(workers));
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let path = path.clone();
                thread::spawn(move || {
                    let conn = open_connection(&path).unwrap();
                    barrier.wait();
                    upsert_place(&conn, "Pizza House", "Main St", Rating::Score(4.5), "pizza")
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<UpsertedPlace> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results
            .iter()
            .all(|upserted| upserted.place.id == results[0].place.id));
        assert_eq!(results.iter().filter(|upserted| upserted.created).count(), 1);
        assert_eq!(count_places(&ctx.connection).unwrap(), 1);
    }
}
