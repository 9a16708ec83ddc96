//! Reviews and the rating aggregates they drive

use crate::core::models::{NewReview, Review, UserSummary};
use crate::core::query::{EntitySchema, FieldKind, FieldSpec, QueryFeatures};
use crate::storage::sql::{limit_offset, order_by, SqlQuery};
use crate::storage::users::recompute_rating;
use crate::storage::{get_id, get_ts, is_unique_violation, now, ts, Store, StoreError};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

static REVIEW_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "rating",
        column: "r.rating",
        kind: FieldKind::Integer,
        sortable: true,
    },
    FieldSpec {
        name: "createdAt",
        column: "r.created_at",
        kind: FieldKind::Timestamp,
        sortable: true,
    },
    FieldSpec {
        name: "reviewer",
        column: "r.reviewer_id",
        kind: FieldKind::Id,
        sortable: false,
    },
    FieldSpec {
        name: "reviewee",
        column: "r.reviewee_id",
        kind: FieldKind::Id,
        sortable: false,
    },
    FieldSpec {
        name: "listing",
        column: "r.listing_id",
        kind: FieldKind::Id,
        sortable: false,
    },
];

pub static REVIEW_SCHEMA: EntitySchema = EntitySchema::new(REVIEW_FIELDS, &[], None, "r.rowid");

const REVIEW_SELECT: &str = "SELECT r.id, r.listing_id, r.reviewee_id, r.rating, r.comment, r.created_at, \
    u.id AS reviewer_id, u.name AS reviewer_name, u.profile_picture_url AS reviewer_picture \
    FROM reviews r JOIN users u ON u.id = r.reviewer_id";

/// Which reviews a list request covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewScope {
    /// Reviews received by a user
    Reviewee(Uuid),
    /// Reviews attached to a listing
    Listing(Uuid),
}

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<Review> {
    Ok(Review {
        id: get_id(row, "id")?,
        listing: get_id(row, "listing_id")?,
        reviewer: UserSummary {
            id: get_id(row, "reviewer_id")?,
            name: row.get("reviewer_name")?,
            profile_picture_url: row.get("reviewer_picture")?,
            location: None,
            email: None,
        },
        reviewee: get_id(row, "reviewee_id")?,
        rating: row.get("rating")?,
        comment: row.get("comment")?,
        created_at: get_ts(row, "created_at")?,
    })
}

fn find_review_in(conn: &Connection, id: Uuid) -> Result<Option<Review>, StoreError> {
    Ok(conn
        .query_row(
            &format!("{} WHERE r.id = ?1", REVIEW_SELECT),
            [id.to_string()],
            review_from_row,
        )
        .optional()?)
}

impl Store {
    /// Insert a review and refresh the reviewee's rating in the same transaction.
    /// A second review for the same (listing, reviewer, reviewee) yields
    /// [`StoreError::Duplicate`].
    pub async fn insert_review(&self, new: &NewReview) -> Result<Review, StoreError> {
        let id = Uuid::new_v4();
        let created = ts(&now());

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO reviews (id, listing_id, reviewer_id, reviewee_id, rating, comment, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.to_string(),
                    new.listing.to_string(),
                    new.reviewer.to_string(),
                    new.reviewee.to_string(),
                    new.rating,
                    new.comment,
                    created
                ],
            );
            match inserted {
                Err(e) if is_unique_violation(&e) => {
                    return Err(StoreError::Duplicate(format!(
                        "listing {} / reviewee {}",
                        new.listing, new.reviewee
                    )))
                }
                other => other?,
            };
            recompute_rating(&tx, new.reviewee)?;
            let review = find_review_in(&tx, id)?
                .ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))?;
            tx.commit()?;
            Ok(review)
        })
        .await
    }

    pub async fn find_review(&self, id: Uuid) -> Result<Option<Review>, StoreError> {
        self.with_conn(|conn| find_review_in(conn, id)).await
    }

    pub async fn list_reviews(
        &self,
        scope: ReviewScope,
        features: &QueryFeatures,
    ) -> Result<Vec<Review>, StoreError> {
        let mut query = SqlQuery::new();
        match scope {
            ReviewScope::Reviewee(id) => {
                query.condition("r.reviewee_id = ?", [SqlValue::Text(id.to_string())])
            }
            ReviewScope::Listing(id) => {
                query.condition("r.listing_id = ?", [SqlValue::Text(id.to_string())])
            }
        }
        query.apply(features, &REVIEW_SCHEMA);

        let sql = format!(
            "{}{} ORDER BY {}{}",
            REVIEW_SELECT,
            query.where_sql(),
            order_by(features, &REVIEW_SCHEMA),
            limit_offset(&features.pagination)
        );
        let params = query.params;

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let reviews = stmt
                .query_map(params_from_iter(params.iter()), review_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(reviews)
        })
        .await
    }

    /// Delete a review and refresh the reviewee's rating; returns the removed review
    pub async fn delete_review(&self, id: Uuid) -> Result<Option<Review>, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let Some(review) = find_review_in(&tx, id)? else {
                return Ok(None);
            };
            tx.execute("DELETE FROM reviews WHERE id = ?1", [id.to_string()])?;
            recompute_rating(&tx, review.reviewee)?;
            tx.commit()?;
            Ok(Some(review))
        })
        .await
    }
}
