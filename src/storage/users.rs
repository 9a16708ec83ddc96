//! User rows

use crate::core::models::{NewUser, ProfilePatch, User, DEFAULT_PROFILE_PICTURE_URL};
use crate::storage::sql::Assignments;
use crate::storage::{
    get_id, get_json, get_opt_ts, get_point, get_ts, is_unique_violation, now, ts, Store,
    StoreError,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, password_hash, password_changed_at, \
    profile_picture_url, profile_picture_public_id, bio, location, longitude, latitude, \
    skills_offered, skills_sought, average_rating, num_reviews, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: get_id(row, "id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        password_changed_at: get_opt_ts(row, "password_changed_at")?,
        profile_picture_url: row.get("profile_picture_url")?,
        profile_picture_public_id: row.get("profile_picture_public_id")?,
        bio: row.get("bio")?,
        location: row.get("location")?,
        coordinates: get_point(row, "longitude", "latitude")?,
        skills_offered: get_json(row, "skills_offered")?,
        skills_sought: get_json(row, "skills_sought")?,
        average_rating: row.get("average_rating")?,
        num_reviews: row.get("num_reviews")?,
        created_at: get_ts(row, "created_at")?,
        updated_at: get_ts(row, "updated_at")?,
    })
}

pub(crate) fn find_user_in(conn: &Connection, id: Uuid) -> Result<Option<User>, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            [id.to_string()],
            user_from_row,
        )
        .optional()?)
}

/// Recompute a user's rating summary from their reviews
pub(crate) fn recompute_rating(conn: &Connection, user_id: Uuid) -> Result<(), StoreError> {
    let (count, average): (i64, Option<f64>) = conn.query_row(
        "SELECT COUNT(*), AVG(rating) FROM reviews WHERE reviewee_id = ?1",
        [user_id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let average = average.map_or(0.0, |avg| (avg * 10.0).round() / 10.0);

    conn.execute(
        "UPDATE users SET average_rating = ?1, num_reviews = ?2 WHERE id = ?3",
        params![average, count, user_id.to_string()],
    )?;
    Ok(())
}

impl Store {
    /// Insert a new account; a taken email yields [`StoreError::Duplicate`]
    pub async fn insert_user(&self, new: &NewUser) -> Result<User, StoreError> {
        let id = Uuid::new_v4();
        let created = ts(&now());

        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, name, email, password_hash, profile_picture_url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    id.to_string(),
                    new.name,
                    new.email,
                    new.password_hash,
                    DEFAULT_PROFILE_PICTURE_URL,
                    created
                ],
            );
            match inserted {
                Err(e) if is_unique_violation(&e) => {
                    return Err(StoreError::Duplicate(new.email.clone()))
                }
                other => other?,
            };
            find_user_in(conn, id)?.ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
        })
        .await
    }

    pub async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.with_conn(|conn| find_user_in(conn, id)).await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                    [email],
                    user_from_row,
                )
                .optional()?)
        })
        .await
    }

    /// Apply profile changes; `Ok(None)` when the user does not exist
    pub async fn update_user_profile(
        &self,
        id: Uuid,
        patch: &ProfilePatch,
    ) -> Result<Option<User>, StoreError> {
        let mut sets = Assignments::new();
        if let Some(name) = &patch.name {
            sets.set_text("name", Some(name));
        }
        if let Some(bio) = &patch.bio {
            sets.set_text("bio", bio.as_deref());
        }
        if let Some(location) = &patch.location {
            sets.set_text("location", location.as_deref());
        }
        if let Some(skills) = &patch.skills_offered {
            sets.set("skills_offered", SqlValue::Text(serde_json::to_string(skills)?));
        }
        if let Some(skills) = &patch.skills_sought {
            sets.set("skills_sought", SqlValue::Text(serde_json::to_string(skills)?));
        }
        if let Some(point) = &patch.coordinates {
            sets.set("longitude", point.map_or(SqlValue::Null, |p| SqlValue::Real(p.longitude)));
            sets.set("latitude", point.map_or(SqlValue::Null, |p| SqlValue::Real(p.latitude)));
        }
        if let Some(photo) = &patch.profile_picture {
            sets.set_text("profile_picture_url", Some(&photo.url));
            sets.set_text("profile_picture_public_id", Some(&photo.public_id));
        }
        sets.set("updated_at", SqlValue::Text(ts(&now())));

        let sql = format!("UPDATE users SET {} WHERE id = ?", sets.sql());
        let mut params = sets.params;
        params.push(SqlValue::Text(id.to_string()));

        self.with_conn(|conn| {
            let changed = conn.execute(&sql, params_from_iter(params.iter()))?;
            if changed == 0 {
                return Ok(None);
            }
            find_user_in(conn, id)
        })
        .await
    }

    pub async fn update_user_password(
        &self,
        id: Uuid,
        password_hash: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password_hash = ?1, password_changed_at = ?2, updated_at = ?3 WHERE id = ?4",
                params![password_hash, ts(&changed_at), ts(&now()), id.to_string()],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            find_user_in(conn, id)
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::geo::GeoPoint;
    use crate::core::models::Photo;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ada Lovelace".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = Store::open_in_memory().await.unwrap();
        let user = store.insert_user(&new_user("ada@example.com")).await.unwrap();

        assert_eq!(user.profile_picture_url, DEFAULT_PROFILE_PICTURE_URL);
        assert_eq!(user.average_rating, 0.0);
        assert_eq!(user.num_reviews, 0);
        assert!(user.skills_offered.is_empty());

        let by_id = store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "ada@example.com");
        let by_email = store.find_user_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(store.find_user(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let store = Store::open_in_memory().await.unwrap();
        store.insert_user(&new_user("ada@example.com")).await.unwrap();
        let err = store.insert_user(&new_user("ada@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(ref v) if v == "ada@example.com"));
    }

    #[tokio::test]
    async fn test_profile_patch() {
        let store = Store::open_in_memory().await.unwrap();
        let user = store.insert_user(&new_user("ada@example.com")).await.unwrap();

        let patch = ProfilePatch {
            bio: Some(Some("Engines".to_string())),
            skills_offered: Some(vec!["math".to_string()]),
            coordinates: Some(GeoPoint::new(-0.12, 51.5)),
            profile_picture: Some(Photo {
                url: "/media/p.png".to_string(),
                public_id: "commongood/user_profiles/p".to_string(),
            }),
            ..Default::default()
        };
        let updated = store.update_user_profile(user.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.bio.as_deref(), Some("Engines"));
        assert_eq!(updated.skills_offered, vec!["math"]);
        assert_eq!(updated.coordinates.unwrap().latitude, 51.5);
        assert_eq!(updated.profile_picture_url, "/media/p.png");
        assert_eq!(updated.name, "Ada Lovelace");

        let cleared = ProfilePatch {
            bio: Some(None),
            coordinates: Some(None),
            ..Default::default()
        };
        let updated = store.update_user_profile(user.id, &cleared).await.unwrap().unwrap();
        assert!(updated.bio.is_none());
        assert!(updated.coordinates.is_none());

        assert!(store
            .update_user_profile(Uuid::new_v4(), &cleared)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_password_records_change() {
        let store = Store::open_in_memory().await.unwrap();
        let user = store.insert_user(&new_user("ada@example.com")).await.unwrap();
        assert!(user.password_changed_at.is_none());

        let changed_at = now();
        let updated = store
            .update_user_password(user.id, "new-hash", changed_at)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.password_hash, "new-hash");
        assert_eq!(updated.password_changed_at, Some(changed_at));
    }
}
