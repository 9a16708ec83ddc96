//! Domain entities and the write models used to create or patch them

use crate::core::geo::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Picture assigned to accounts that never uploaded one
pub const DEFAULT_PROFILE_PICTURE_URL: &str =
    "https://res.cloudinary.com/demo/image/upload/w_150,h_150,c_thumb,g_face,r_max/default_profile.png";

/// A stored image: public URL plus the media-storage identifier used to delete it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub url: String,
    pub public_id: String,
}

/// Registered account
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub password_changed_at: Option<DateTime<Utc>>,
    pub profile_picture_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture_public_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<GeoPoint>,
    pub skills_offered: Vec<String>,
    pub skills_sought: Vec<String>,
    pub average_rating: f64,
    pub num_reviews: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// True when the password was changed after a token issued at `issued_at` (unix seconds)
    pub fn changed_password_after(&self, issued_at: i64) -> bool {
        self.password_changed_at
            .map(|changed| changed.timestamp() > issued_at)
            .unwrap_or(false)
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            profile_picture_url: self.profile_picture_url.clone(),
            location: None,
            email: None,
        }
    }
}

/// The populated view of a user embedded in other entities
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub profile_picture_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingType {
    OfferSkill,
    RequestSkill,
    OfferItem,
    RequestItem,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::OfferSkill => "OfferSkill",
            ListingType::RequestSkill => "RequestSkill",
            ListingType::OfferItem => "OfferItem",
            ListingType::RequestItem => "RequestItem",
        }
    }
}

impl FromStr for ListingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OfferSkill" => Ok(ListingType::OfferSkill),
            "RequestSkill" => Ok(ListingType::RequestSkill),
            "OfferItem" => Ok(ListingType::OfferItem),
            "RequestItem" => Ok(ListingType::RequestItem),
            other => Err(format!("Unknown listing type: {}", other)),
        }
    }
}

impl fmt::Display for ListingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    PendingExchange,
    Completed,
    Cancelled,
    Expired,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::PendingExchange => "pending_exchange",
            ListingStatus::Completed => "completed",
            ListingStatus::Cancelled => "cancelled",
            ListingStatus::Expired => "expired",
        }
    }
}

impl FromStr for ListingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ListingStatus::Active),
            "pending_exchange" => Ok(ListingStatus::PendingExchange),
            "completed" => Ok(ListingStatus::Completed),
            "cancelled" => Ok(ListingStatus::Cancelled),
            "expired" => Ok(ListingStatus::Expired),
            other => Err(format!("Unknown listing status: {}", other)),
        }
    }
}

/// An offer or request posted by a user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user: UserSummary,
    pub listing_type: ListingType,
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub photos: Vec<Photo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_effort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_preference: Option<String>,
    pub status: ListingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing preview embedded in conversations
#[derive(Debug, Clone, Serialize)]
pub struct ListingPreview {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub photos: Vec<Photo>,
}

/// Listing header returned alongside its reviews
#[derive(Debug, Clone, Serialize)]
pub struct ListingSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub user: Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub conversation: Uuid,
    pub sender: UserSummary,
    pub receiver: UserSummary,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Last message of a conversation as shown in the inbox
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePreview {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub content: String,
    pub sender: UserSummary,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub participants: Vec<UserSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing: Option<ListingPreview>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<MessagePreview>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Participants of a conversation without any populated data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationMembers {
    pub id: Uuid,
    pub participants: [Uuid; 2],
    pub listing: Option<Uuid>,
}

impl ConversationMembers {
    pub fn includes(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    /// The participant that is not `user_id`
    pub fn other(&self, user_id: Uuid) -> Option<Uuid> {
        if !self.includes(user_id) {
            return None;
        }
        self.participants.iter().copied().find(|p| *p != user_id)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub listing: Uuid,
    pub reviewer: UserSummary,
    pub reviewee: Uuid,
    pub rating: i64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Rating header returned alongside a user's reviews
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevieweeSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub average_rating: f64,
    pub num_reviews: i64,
}

impl From<&User> for RevieweeSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            average_rating: user.average_rating,
            num_reviews: user.num_reviews,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Profile changes; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub bio: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub skills_offered: Option<Vec<String>>,
    pub skills_sought: Option<Vec<String>>,
    pub coordinates: Option<Option<GeoPoint>>,
    pub profile_picture: Option<Photo>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.bio.is_none()
            && self.location.is_none()
            && self.skills_offered.is_none()
            && self.skills_sought.is_none()
            && self.coordinates.is_none()
            && self.profile_picture.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewListing {
    pub owner: Uuid,
    pub listing_type: ListingType,
    pub title: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub photos: Vec<Photo>,
    pub estimated_effort: Option<String>,
    pub exchange_preference: Option<String>,
    pub location: Option<String>,
    pub coordinates: Option<GeoPoint>,
}

/// Listing changes applied atomically by the store
#[derive(Debug, Clone, Default)]
pub struct ListingPatch {
    pub listing_type: Option<ListingType>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub estimated_effort: Option<Option<String>>,
    pub exchange_preference: Option<Option<String>>,
    pub status: Option<ListingStatus>,
    pub location: Option<Option<String>>,
    pub coordinates: Option<Option<GeoPoint>>,
    pub add_photos: Vec<Photo>,
    pub remove_photos: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub listing: Uuid,
    pub reviewer: Uuid,
    pub reviewee: Uuid,
    pub rating: i64,
    pub comment: String,
}
