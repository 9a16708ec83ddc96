//! Listing rows and the listing query surface

use crate::core::models::{Listing, ListingPatch, NewListing, Photo, UserSummary};
use crate::core::query::{EntitySchema, FieldKind, FieldSpec, QueryFeatures};
use crate::storage::sql::{limit_offset, order_by, Assignments, SqlQuery};
use crate::storage::{
    conversion_error, get_id, get_json, get_point, get_ts, now, ts, Store, StoreError,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use uuid::Uuid;

static LISTING_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "listingType",
        column: "l.listing_type",
        kind: FieldKind::Text,
        sortable: true,
    },
    FieldSpec {
        name: "title",
        column: "l.title",
        kind: FieldKind::Text,
        sortable: true,
    },
    FieldSpec {
        name: "category",
        column: "l.category",
        kind: FieldKind::Text,
        sortable: true,
    },
    FieldSpec {
        name: "status",
        column: "l.status",
        kind: FieldKind::Text,
        sortable: true,
    },
    FieldSpec {
        name: "location",
        column: "l.location",
        kind: FieldKind::Text,
        sortable: true,
    },
    FieldSpec {
        name: "estimatedEffort",
        column: "l.estimated_effort",
        kind: FieldKind::Text,
        sortable: false,
    },
    FieldSpec {
        name: "exchangePreference",
        column: "l.exchange_preference",
        kind: FieldKind::Text,
        sortable: false,
    },
    FieldSpec {
        name: "tags",
        column: "l.tags",
        kind: FieldKind::TagList,
        sortable: false,
    },
    FieldSpec {
        name: "user",
        column: "l.user_id",
        kind: FieldKind::Id,
        sortable: false,
    },
    FieldSpec {
        name: "createdAt",
        column: "l.created_at",
        kind: FieldKind::Timestamp,
        sortable: true,
    },
    FieldSpec {
        name: "updatedAt",
        column: "l.updated_at",
        kind: FieldKind::Timestamp,
        sortable: true,
    },
];

/// Query surface of `GET /listings`
pub static LISTING_SCHEMA: EntitySchema = EntitySchema::new(
    LISTING_FIELDS,
    &["l.title", "l.description", "l.tags", "l.category", "l.location"],
    Some(("l.longitude", "l.latitude")),
    "l.rowid",
);

const LISTING_FROM: &str = " FROM listings l JOIN users u ON u.id = l.user_id";

const LISTING_SELECT: &str = "SELECT l.id, l.user_id, l.listing_type, l.title, l.description, \
    l.category, l.tags, l.photos, l.estimated_effort, l.exchange_preference, l.status, \
    l.location, l.longitude, l.latitude, l.created_at, l.updated_at, \
    u.name AS owner_name, u.profile_picture_url AS owner_picture, u.location AS owner_location";

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<Listing> {
    let listing_type: String = row.get("listing_type")?;
    let status: String = row.get("status")?;

    Ok(Listing {
        id: get_id(row, "id")?,
        user: UserSummary {
            id: get_id(row, "user_id")?,
            name: row.get("owner_name")?,
            profile_picture_url: row.get("owner_picture")?,
            location: row.get("owner_location")?,
            email: None,
        },
        listing_type: listing_type.parse().map_err(conversion_error)?,
        title: row.get("title")?,
        description: row.get("description")?,
        category: row.get("category")?,
        tags: get_json(row, "tags")?,
        photos: get_json(row, "photos")?,
        estimated_effort: row.get("estimated_effort")?,
        exchange_preference: row.get("exchange_preference")?,
        status: status.parse().map_err(conversion_error)?,
        location: row.get("location")?,
        coordinates: get_point(row, "longitude", "latitude")?,
        created_at: get_ts(row, "created_at")?,
        updated_at: get_ts(row, "updated_at")?,
    })
}

pub(crate) fn find_listing_in(conn: &Connection, id: Uuid) -> Result<Option<Listing>, StoreError> {
    Ok(conn
        .query_row(
            &format!("{}{} WHERE l.id = ?1", LISTING_SELECT, LISTING_FROM),
            [id.to_string()],
            listing_from_row,
        )
        .optional()?)
}

/// Result of a listing update
#[derive(Debug, Clone)]
pub struct ListingUpdate {
    pub listing: Listing,
    /// Photos that were attached to the listing and are now detached
    pub removed_photos: Vec<Photo>,
}

impl Store {
    pub async fn insert_listing(&self, new: &NewListing) -> Result<Listing, StoreError> {
        let id = Uuid::new_v4();
        let created = ts(&now());
        let tags = serde_json::to_string(&new.tags)?;
        let photos = serde_json::to_string(&new.photos)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO listings (id, user_id, listing_type, title, description, category, tags, photos,
                    estimated_effort, exchange_preference, status, location, longitude, latitude, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'active', ?11, ?12, ?13, ?14, ?14)",
                params![
                    id.to_string(),
                    new.owner.to_string(),
                    new.listing_type.as_str(),
                    new.title,
                    new.description,
                    new.category,
                    tags,
                    photos,
                    new.estimated_effort,
                    new.exchange_preference,
                    new.location,
                    new.coordinates.map(|p| p.longitude),
                    new.coordinates.map(|p| p.latitude),
                    created
                ],
            )?;
            find_listing_in(conn, id)?.ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
        })
        .await
    }

    pub async fn find_listing(&self, id: Uuid) -> Result<Option<Listing>, StoreError> {
        self.with_conn(|conn| find_listing_in(conn, id)).await
    }

    /// One page of listings plus the number of rows matching the filters
    pub async fn search_listings(
        &self,
        features: &QueryFeatures,
    ) -> Result<(Vec<Listing>, u64), StoreError> {
        let mut query = SqlQuery::new();
        query.apply(features, &LISTING_SCHEMA);
        let where_sql = query.where_sql();

        let count_sql = format!("SELECT COUNT(*){}{}", LISTING_FROM, where_sql);
        let page_sql = format!(
            "{}{}{} ORDER BY {}{}",
            LISTING_SELECT,
            LISTING_FROM,
            where_sql,
            order_by(features, &LISTING_SCHEMA),
            limit_offset(&features.pagination)
        );

        self.with_conn(|conn| {
            let total: i64 =
                conn.query_row(&count_sql, params_from_iter(query.params.iter()), |row| row.get(0))?;
            let mut stmt = conn.prepare(&page_sql)?;
            let listings = stmt
                .query_map(params_from_iter(query.params.iter()), listing_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok((listings, total.max(0) as u64))
        })
        .await
    }

    /// Apply `patch` in one transaction; `Ok(None)` when the listing does not exist
    pub async fn update_listing(
        &self,
        id: Uuid,
        patch: &ListingPatch,
    ) -> Result<Option<ListingUpdate>, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let Some(current) = find_listing_in(&tx, id)? else {
                return Ok(None);
            };

            let mut sets = Assignments::new();
            if let Some(listing_type) = &patch.listing_type {
                sets.set_text("listing_type", Some(listing_type.as_str()));
            }
            if let Some(title) = &patch.title {
                sets.set_text("title", Some(title));
            }
            if let Some(description) = &patch.description {
                sets.set_text("description", Some(description));
            }
            if let Some(category) = &patch.category {
                sets.set_text("category", Some(category));
            }
            if let Some(tags) = &patch.tags {
                sets.set("tags", SqlValue::Text(serde_json::to_string(tags)?));
            }
            if let Some(effort) = &patch.estimated_effort {
                sets.set_text("estimated_effort", effort.as_deref());
            }
            if let Some(preference) = &patch.exchange_preference {
                sets.set_text("exchange_preference", preference.as_deref());
            }
            if let Some(status) = &patch.status {
                sets.set_text("status", Some(status.as_str()));
            }
            if let Some(location) = &patch.location {
                sets.set_text("location", location.as_deref());
            }
            if let Some(point) = &patch.coordinates {
                sets.set("longitude", point.map_or(SqlValue::Null, |p| SqlValue::Real(p.longitude)));
                sets.set("latitude", point.map_or(SqlValue::Null, |p| SqlValue::Real(p.latitude)));
            }

            let mut removed_photos = Vec::new();
            if !patch.add_photos.is_empty() || !patch.remove_photos.is_empty() {
                let (removed, mut kept): (Vec<Photo>, Vec<Photo>) = current
                    .photos
                    .into_iter()
                    .partition(|photo| patch.remove_photos.contains(&photo.public_id));
                kept.extend(patch.add_photos.iter().cloned());
                sets.set("photos", SqlValue::Text(serde_json::to_string(&kept)?));
                removed_photos = removed;
            }
            sets.set("updated_at", SqlValue::Text(ts(&now())));

            let mut values = sets.params.clone();
            values.push(SqlValue::Text(id.to_string()));
            tx.execute(
                &format!("UPDATE listings SET {} WHERE id = ?", sets.sql()),
                params_from_iter(values.iter()),
            )?;

            let listing = find_listing_in(&tx, id)?
                .ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))?;
            tx.commit()?;
            Ok(Some(ListingUpdate {
                listing,
                removed_photos,
            }))
        })
        .await
    }

    /// Returns whether a row was deleted
    pub async fn delete_listing(&self, id: Uuid) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM listings WHERE id = ?1", params![id.to_string()])?;
            Ok(deleted > 0)
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::geo::GeoPoint;
    use crate::core::models::{ListingStatus, ListingType, NewUser};

    async fn store_with_owner() -> (Store, Uuid) {
        let store = Store::open_in_memory().await.unwrap();
        let owner = store
            .insert_user(&NewUser {
                name: "Grace".to_string(),
                email: "grace@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        (store, owner.id)
    }

    fn new_listing(owner: Uuid, title: &str, tags: &[&str], coordinates: Option<GeoPoint>) -> NewListing {
        NewListing {
            owner,
            listing_type: ListingType::OfferSkill,
            title: title.to_string(),
            description: "A long enough description".to_string(),
            category: "Technology".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            photos: vec![],
            estimated_effort: None,
            exchange_preference: None,
            location: None,
            coordinates,
        }
    }

    fn features(items: &[(&str, &str)]) -> QueryFeatures {
        let params: Vec<(String, String)> = items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        QueryFeatures::parse(&params, &LISTING_SCHEMA).unwrap()
    }

    #[tokio::test]
    async fn test_insert_populates_owner() {
        let (store, owner) = store_with_owner().await;
        let listing = store
            .insert_listing(&new_listing(owner, "Guitar lessons", &["music"], None))
            .await
            .unwrap();

        assert_eq!(listing.user.id, owner);
        assert_eq!(listing.user.name, "Grace");
        assert_eq!(listing.status, ListingStatus::Active);
        assert_eq!(listing.tags, vec!["music"]);
        assert!(store.find_listing(listing.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_search_filters_sorts_and_counts() {
        let (store, owner) = store_with_owner().await;
        for (title, tags) in [
            ("Guitar lessons", vec!["music"]),
            ("Bike repair", vec!["repair", "outdoors"]),
            ("Piano tuning", vec!["music"]),
        ] {
            store
                .insert_listing(&new_listing(owner, title, &tags, None))
                .await
                .unwrap();
        }

        let (page, total) = store.search_listings(&features(&[])).await.unwrap();
        assert_eq!(total, 3);
        // newest first
        assert_eq!(page[0].title, "Piano tuning");

        let (page, total) = store
            .search_listings(&features(&[("tags", "music"), ("sort", "title")]))
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(page[0].title, "Guitar lessons");

        let (page, _) = store
            .search_listings(&features(&[("search", "BIKE violin")]))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "Bike repair");

        let (page, total) = store
            .search_listings(&features(&[("limit", "1"), ("page", "2")]))
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "Bike repair");
    }

    #[tokio::test]
    async fn test_geo_radius() {
        let (store, owner) = store_with_owner().await;
        store
            .insert_listing(&new_listing(owner, "Paris job", &[], GeoPoint::new(2.3522, 48.8566)))
            .await
            .unwrap();
        store
            .insert_listing(&new_listing(owner, "London job", &[], GeoPoint::new(-0.1276, 51.5072)))
            .await
            .unwrap();
        store
            .insert_listing(&new_listing(owner, "Nowhere job", &[], None))
            .await
            .unwrap();

        let (page, total) = store
            .search_listings(&features(&[("latlng", "48.85,2.35"), ("distance", "50")]))
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(page[0].title, "Paris job");

        let (_, total) = store
            .search_listings(&features(&[("latlng", "48.85,2.35"), ("distance", "500")]))
            .await
            .unwrap();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn test_update_photos_and_fields() {
        let (store, owner) = store_with_owner().await;
        let mut new = new_listing(owner, "Guitar lessons", &[], GeoPoint::new(1.0, 1.0));
        new.photos = vec![
            Photo {
                url: "/media/a.png".to_string(),
                public_id: "a".to_string(),
            },
            Photo {
                url: "/media/b.png".to_string(),
                public_id: "b".to_string(),
            },
        ];
        let listing = store.insert_listing(&new).await.unwrap();

        let patch = ListingPatch {
            title: Some("Guitar and bass lessons".to_string()),
            status: Some(ListingStatus::Completed),
            coordinates: Some(None),
            add_photos: vec![Photo {
                url: "/media/c.png".to_string(),
                public_id: "c".to_string(),
            }],
            remove_photos: vec!["a".to_string(), "unknown".to_string()],
            ..Default::default()
        };
        let update = store.update_listing(listing.id, &patch).await.unwrap().unwrap();

        assert_eq!(update.listing.title, "Guitar and bass lessons");
        assert_eq!(update.listing.status, ListingStatus::Completed);
        assert!(update.listing.coordinates.is_none());
        let ids: Vec<_> = update.listing.photos.iter().map(|p| p.public_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(update.removed_photos.len(), 1);
        assert_eq!(update.removed_photos[0].public_id, "a");

        assert!(store
            .update_listing(Uuid::new_v4(), &patch)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, owner) = store_with_owner().await;
        let listing = store
            .insert_listing(&new_listing(owner, "Guitar lessons", &[], None))
            .await
            .unwrap();
        assert!(store.delete_listing(listing.id).await.unwrap());
        assert!(!store.delete_listing(listing.id).await.unwrap());
        assert!(store.find_listing(listing.id).await.unwrap().is_none());
    }
}
