use rusqlite::{Connection, Row};
use serde::Serialize;
use tracing::info;

use crate::errors::{AppError, AppResult};

const MAX_TEXT_LEN: usize = 200;
const SCORE_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: i64,
    pub place_name: String,
    pub rating: u8,
    pub price: u8,
    pub comments: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub place_name: String,
    pub rating: u8,
    pub price: u8,
    pub comments: Option<String>,
}

impl NewReview {
    /// Trims text fields and checks both scores are on the 1-5 scale.
    pub fn validate(self) -> AppResult<Self> {
        let place_name = self.place_name.trim().to_string();
        if place_name.is_empty() {
            return Err(AppError::Validation("business name is required".into()));
        }
        if place_name.chars().count() > MAX_TEXT_LEN {
            return Err(AppError::Validation(format!(
                "business name exceeds {MAX_TEXT_LEN} characters"
            )));
        }
        check_score("rating", self.rating)?;
        check_score("price", self.price)?;

        let comments = self
            .comments
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        if comments
            .as_ref()
            .is_some_and(|text| text.chars().count() > MAX_TEXT_LEN)
        {
            return Err(AppError::Validation(format!(
                "comments exceed {MAX_TEXT_LEN} characters"
            )));
        }

        Ok(Self {
            place_name,
            rating: self.rating,
            price: self.price,
            comments,
        })
    }
}

fn check_score(field: &str, value: u8) -> AppResult<()> {
    if SCORE_RANGE.contains(&value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{field} must be between 1 and 5, got {value}"
        )))
    }
}

pub fn add_review(connection: &Connection, review: NewReview) -> AppResult<Review> {
    let review = review.validate()?;
    connection.execute(
        "INSERT INTO reviews (place_name, rating, price, comments) VALUES (?1, ?2, ?3, ?4)",
        (
            review.place_name.as_str(),
            review.rating,
            review.price,
            review.comments.as_deref(),
        ),
    )?;
    let id = connection.last_insert_rowid();
    info!(target: "reviews", id, place = review.place_name.as_str(), "review added");
    connection
        .query_row(
            "SELECT id, place_name, rating, price, comments, created_at FROM reviews WHERE id = ?1",
            [id],
            review_from_row,
        )
        .map_err(AppError::from)
}

pub fn list_reviews(connection: &Connection) -> AppResult<Vec<Review>> {
    let mut stmt = connection.prepare(
        "SELECT id, place_name, rating, price, comments, created_at FROM reviews ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map([], review_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: row.get(0)?,
        place_name: row.get(1)?,
        rating: row.get(2)?,
        price: row.get(3)?,
        comments: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::db::bootstrap;

    fn review(rating: u8, price: u8) -> NewReview {
        NewReview {
            place_name: "  Pizza House ".into(),
            rating,
            price,
            comments: Some("   ".into()),
        }
    }

    #[test]
    fn stores_and_lists_reviews() {
        let dir = tempdir().unwrap();
        let conn = bootstrap(dir.path(), "reviews.db").unwrap().connection;

        let saved = add_review(&conn, review(5, 2)).unwrap();
        assert_eq!(saved.place_name, "Pizza House");
        assert!(saved.comments.is_none());

        add_review(
            &conn,
            NewReview {
                place_name: "Slice".into(),
                rating: 3,
                price: 1,
                comments: Some("cheap and fast".into()),
            },
        )
        .unwrap();

        let all = list_reviews(&conn).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, saved.id);
        assert_eq!(all[1].comments.as_deref(), Some("cheap and fast"));
    }

    #[test]
    fn rejects_out_of_range_scores() {
        assert!(matches!(review(0, 3).validate(), Err(AppError::Validation(_))));
        assert!(matches!(review(3, 6).validate(), Err(AppError::Validation(_))));
        assert!(review(1, 5).validate().is_ok());
    }

    #[test]
    fn rejects_blank_business_name() {
        let dir = tempdir().unwrap();
        let conn = bootstrap(dir.path(), "blank.db").unwrap().connection;
        let mut blank = review(4, 4);
        blank.place_name = " ".into();
        assert!(add_review(&conn, blank).is_err());
        assert!(list_reviews(&conn).unwrap().is_empty());
    }
}
