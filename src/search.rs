use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::db::with_immediate_tx;
use crate::errors::{AppError, AppResult};
use crate::places::{upsert_place, Place};
use crate::places_api::{PlacesService, RawResult, SearchArea};
use crate::terms::{get_or_create_term, SearchTerm};

/// A validated, whitespace-normalized search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery(String);

impl SearchQuery {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() {
            return Err(AppError::Validation("you must enter a keyword".into()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub term: SearchTerm,
    /// One entry per result slot, in API order.
    pub places: Vec<Place>,
    pub created_places: usize,
    pub searched_at: DateTime<Utc>,
}

pub struct PlaceSearchService {
    db: Arc<Mutex<Connection>>,
    lookup: PlacesService,
    area: SearchArea,
    result_limit: usize,
}

impl PlaceSearchService {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        lookup: PlacesService,
        area: SearchArea,
        result_limit: usize,
    ) -> Self {
        Self {
            db,
            lookup,
            area,
            result_limit: result_limit.max(1),
        }
    }

    /// Fetches the top results for `raw_query` and records them.
    ///
    /// Nothing is written when the fetch fails. Otherwise the term and every
    /// place are written in one transaction.
    pub async fn search(&self, raw_query: &str) -> AppResult<SearchOutcome> {
        let query = SearchQuery::parse(raw_query)?;
        let results = match self
            .lookup
            .fetch_top_results(query.as_str(), &self.area, self.result_limit)
            .await
        {
            Ok(results) => results,
            Err(err) => {
                warn!(target: "search", term = query.as_str(), error = %err, "places fetch failed");
                return Err(AppError::Fetch(err));
            }
        };

        let outcome = {
            let mut conn = self.db.lock();
            with_immediate_tx(&mut conn, |tx| record_results(tx, &query, &results))?
        };

        info!(
            target: "search",
            term = outcome.term.term.as_str(),
            slots = outcome.places.len(),
            created = outcome.created_places,
            "search recorded"
        );
        Ok(outcome)
    }
}

fn record_results(
    connection: &Connection,
    query: &SearchQuery,
    results: &[RawResult],
) -> AppResult<SearchOutcome> {
    let term = get_or_create_term(connection, query.as_str())?;
    let mut places = Vec::with_capacity(results.len());
    let mut created_places = 0;
    for result in results {
        let upserted = upsert_place(
            connection,
            &result.name,
            &result.location,
            result.rating,
            query.as_str(),
        )?;
        if upserted.created {
            created_places += 1;
        }
        places.push(upserted.place);
    }
    Ok(SearchOutcome {
        term,
        places,
        created_places,
        searched_at: Utc::now(),
    })
}
