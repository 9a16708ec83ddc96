//! Request and response models for the HTTP API

use crate::core::geo::GeoPoint;
use crate::core::models::{
    Conversation, ListingPatch, ListingStatus, ListingSummary, ListingType, Message, NewListing,
    ProfilePatch, Review, RevieweeSummary, User,
};
use crate::core::service::FieldError;
use crate::http::errors::{HttpError, HttpResult};
use crate::storage::StoreCounts;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

/// Success envelope: `{status: "success", token?, results?, totalResults?, data}`
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_results: Option<u64>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            token: None,
            results: None,
            total_results: None,
            data,
        }
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_results(mut self, results: usize) -> Self {
        self.results = Some(results);
        self
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total_results = Some(total);
        self
    }
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Debug, Serialize)]
pub struct UserData {
    pub user: Value,
}

impl UserData {
    /// The account as its owner sees it
    pub fn own(user: &User) -> HttpResult<Self> {
        Ok(Self {
            user: to_json(user)?,
        })
    }

    /// The account as anyone else sees it: no email
    pub fn public(user: &User) -> HttpResult<Self> {
        let mut user = to_json(user)?;
        if let Value::Object(map) = &mut user {
            map.remove("email");
        }
        Ok(Self { user })
    }
}

#[derive(Debug, Serialize)]
pub struct ListingsData {
    pub listings: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct ListingData<T> {
    pub listing: T,
}

#[derive(Debug, Serialize)]
pub struct ConversationStartData {
    pub conversation: Conversation,
    pub message: Message,
}

#[derive(Debug, Serialize)]
pub struct ConversationsData {
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Serialize)]
pub struct MessagesData {
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct MessageData {
    pub message: Message,
}

#[derive(Debug, Serialize)]
pub struct ReviewData {
    pub review: Review,
}

#[derive(Debug, Serialize)]
pub struct UserReviewsData {
    pub reviewee: RevieweeSummary,
    pub reviews: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct ListingReviewsData {
    pub listing: ListingSummary,
    pub reviews: Vec<Value>,
}

/// Status response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: String,
    pub environment: String,
    pub uptime_seconds: u64,
    pub counts: StoreCounts,
}

fn to_json<T: Serialize>(value: &T) -> HttpResult<Value> {
    serde_json::to_value(value).map_err(|e| HttpError::Internal(e.to_string()))
}

/// A list given either as an array or as one comma-separated string
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StringList {
    Many(Vec<String>),
    One(String),
}

impl StringList {
    /// Trimmed entries with empties dropped
    pub fn into_vec(self) -> Vec<String> {
        let items = match self {
            StringList::Many(items) => items,
            StringList::One(joined) => joined.split(',').map(str::to_string).collect(),
        };
        items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }
}

/// Deserialize any present value, including `null`, as `Some`
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

/// Empty strings mean "clear"
fn clearable(value: Option<String>) -> Option<Option<String>> {
    trimmed(value).map(|v| if v.is_empty() { None } else { Some(v) })
}

fn validated<T: Validate>(request: &T) -> HttpResult<()> {
    request.validate().map_err(HttpError::from)
}

fn coordinates(raw: Option<Value>) -> HttpResult<Option<Option<GeoPoint>>> {
    raw.map(|value| GeoPoint::from_json(&value).map_err(HttpError::from))
        .transpose()
}

fn listing_type(raw: &str) -> HttpResult<ListingType> {
    raw.parse().map_err(|_| {
        HttpError::Validation(vec![FieldError::new("listingType", "Invalid listing type.")])
    })
}

#[derive(Debug, Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 2, max = 50, message = "Name must be between 2 and 50 characters."))]
    pub name: Option<String>,

    #[validate(email(message = "Please provide a valid email address."))]
    pub email: Option<String>,

    #[validate(length(min = 8, message = "Password must be at least 8 characters long."))]
    pub password: Option<String>,
}

impl SignupRequest {
    /// `(name, email, password)` after presence and rule checks
    pub fn into_parts(self) -> HttpResult<(String, String, String)> {
        let request = Self {
            name: trimmed(self.name).filter(|v| !v.is_empty()),
            email: trimmed(self.email).filter(|v| !v.is_empty()),
            password: self.password.filter(|v| !v.is_empty()),
        };
        let (Some(name), Some(email), Some(password)) =
            (&request.name, &request.email, &request.password)
        else {
            return Err(HttpError::BadRequest(
                "Please provide name, email, and password!".to_string(),
            ));
        };
        validated(&request)?;
        Ok((name.clone(), email.to_lowercase(), password.clone()))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn into_parts(self) -> HttpResult<(String, String)> {
        match (
            trimmed(self.email).filter(|v| !v.is_empty()),
            self.password.filter(|v| !v.is_empty()),
        ) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => Err(HttpError::BadRequest(
                "Please provide email and password!".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub password_current: Option<String>,

    #[validate(length(min = 8, message = "Password must be at least 8 characters long."))]
    pub password: Option<String>,

    pub password_confirm: Option<String>,
}

impl UpdatePasswordRequest {
    /// `(current, new)`
    pub fn into_parts(self) -> HttpResult<(String, String)> {
        let (Some(current), Some(new)) = (
            self.password_current.clone().filter(|v| !v.is_empty()),
            self.password.clone().filter(|v| !v.is_empty()),
        ) else {
            return Err(HttpError::BadRequest(
                "Please provide your current password and a new password.".to_string(),
            ));
        };
        validated(&self)?;
        if let Some(confirm) = &self.password_confirm {
            if *confirm != new {
                return Err(HttpError::Validation(vec![FieldError::new(
                    "passwordConfirm",
                    "Passwords are not the same!",
                )]));
            }
        }
        Ok((current, new))
    }
}

#[derive(Debug, Deserialize, Validate, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    #[validate(length(min = 2, max = 50, message = "Name must be between 2 and 50 characters."))]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Bio cannot be more than 500 characters."))]
    pub bio: Option<String>,

    #[validate(length(max = 100, message = "Location cannot be more than 100 characters."))]
    pub location: Option<String>,

    pub skills_offered: Option<StringList>,
    pub skills_sought: Option<StringList>,

    #[serde(default, deserialize_with = "present")]
    pub coordinates: Option<Value>,

    #[serde(default, deserialize_with = "present")]
    pub password: Option<Value>,

    #[serde(default, deserialize_with = "present")]
    pub password_confirm: Option<Value>,
}

impl UpdateMeRequest {
    /// Whitelisted profile changes; password fields are refused
    pub fn into_patch(self) -> HttpResult<ProfilePatch> {
        if self.password.is_some() || self.password_confirm.is_some() {
            return Err(HttpError::BadRequest(
                "This route is not for password updates. Please use /updateMyPassword.".to_string(),
            ));
        }
        let request = Self {
            name: trimmed(self.name),
            bio: trimmed(self.bio),
            location: trimmed(self.location),
            ..self
        };
        validated(&request)?;

        Ok(ProfilePatch {
            name: request.name,
            bio: clearable(request.bio),
            location: clearable(request.location),
            skills_offered: request.skills_offered.map(StringList::into_vec),
            skills_sought: request.skills_sought.map(StringList::into_vec),
            coordinates: coordinates(request.coordinates)?,
            profile_picture: None,
        })
    }
}

#[derive(Debug, Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    pub listing_type: Option<String>,

    #[validate(length(min = 5, max = 100, message = "Title must be between 5 and 100 characters."))]
    pub title: Option<String>,

    #[validate(length(
        min = 10,
        max = 1000,
        message = "Description must be between 10 and 1000 characters."
    ))]
    pub description: Option<String>,

    pub category: Option<String>,
    pub tags: Option<StringList>,
    pub estimated_effort: Option<String>,
    pub exchange_preference: Option<String>,
    pub location: Option<String>,

    #[serde(default, deserialize_with = "present")]
    pub coordinates: Option<Value>,
}

impl CreateListingRequest {
    /// The listing to create; the owner is filled in by the service
    pub fn into_new_listing(self) -> HttpResult<NewListing> {
        let request = Self {
            listing_type: trimmed(self.listing_type).filter(|v| !v.is_empty()),
            title: trimmed(self.title).filter(|v| !v.is_empty()),
            description: trimmed(self.description).filter(|v| !v.is_empty()),
            category: trimmed(self.category).filter(|v| !v.is_empty()),
            ..self
        };
        let (Some(kind), Some(title), Some(description), Some(category)) = (
            request.listing_type.clone(),
            request.title.clone(),
            request.description.clone(),
            request.category.clone(),
        ) else {
            return Err(HttpError::BadRequest(
                "Please provide listing type, title, description, and category.".to_string(),
            ));
        };
        let listing_type = listing_type(&kind)?;
        validated(&request)?;

        Ok(NewListing {
            owner: Uuid::nil(),
            listing_type,
            title,
            description,
            category,
            tags: request.tags.map(StringList::into_vec).unwrap_or_default(),
            photos: Vec::new(),
            estimated_effort: clearable(request.estimated_effort).flatten(),
            exchange_preference: clearable(request.exchange_preference).flatten(),
            location: clearable(request.location).flatten(),
            coordinates: coordinates(request.coordinates)?.flatten(),
        })
    }
}

#[derive(Debug, Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingRequest {
    pub listing_type: Option<String>,

    #[validate(length(min = 5, max = 100, message = "Title must be between 5 and 100 characters."))]
    pub title: Option<String>,

    #[validate(length(
        min = 10,
        max = 1000,
        message = "Description must be between 10 and 1000 characters."
    ))]
    pub description: Option<String>,

    #[validate(length(min = 1, message = "Category cannot be empty if provided."))]
    pub category: Option<String>,

    pub tags: Option<StringList>,
    pub estimated_effort: Option<String>,
    pub exchange_preference: Option<String>,
    pub status: Option<String>,
    pub location: Option<String>,

    #[serde(default, deserialize_with = "present")]
    pub coordinates: Option<Value>,

    pub delete_photos: Option<StringList>,
}

impl UpdateListingRequest {
    pub fn into_patch(self) -> HttpResult<ListingPatch> {
        let request = Self {
            title: trimmed(self.title),
            description: trimmed(self.description),
            category: trimmed(self.category),
            ..self
        };
        validated(&request)?;

        let listing_type = match request.listing_type.as_deref().map(str::trim) {
            Some(raw) => Some(listing_type(raw)?),
            None => None,
        };
        let status = match request.status.as_deref().map(str::trim) {
            Some(raw) => Some(raw.parse::<ListingStatus>().map_err(|_| {
                HttpError::Validation(vec![FieldError::new("status", "Invalid listing status.")])
            })?),
            None => None,
        };

        Ok(ListingPatch {
            listing_type,
            title: request.title,
            description: request.description,
            category: request.category,
            tags: request.tags.map(StringList::into_vec),
            estimated_effort: clearable(request.estimated_effort),
            exchange_preference: clearable(request.exchange_preference),
            status,
            location: clearable(request.location),
            coordinates: coordinates(request.coordinates)?,
            add_photos: Vec::new(),
            remove_photos: request
                .delete_photos
                .map(StringList::into_vec)
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StartConversationRequest {
    pub receiver_id: Option<String>,
    pub listing_id: Option<String>,
    pub content: Option<String>,
}

impl StartConversationRequest {
    /// `(receiver, listing, content)`
    pub fn into_parts(self) -> HttpResult<(Uuid, Option<Uuid>, String)> {
        let receiver = trimmed(self.receiver_id).filter(|v| !v.is_empty());
        let content = trimmed(self.content).filter(|v| !v.is_empty());
        let (Some(receiver), Some(content)) = (receiver, content) else {
            return Err(HttpError::BadRequest(
                "Receiver and message content are required.".to_string(),
            ));
        };

        let receiver = Uuid::parse_str(&receiver)
            .map_err(|_| HttpError::BadRequest("Invalid receiver ID format.".to_string()))?;
        let listing = match trimmed(self.listing_id).filter(|v| !v.is_empty()) {
            Some(raw) => Some(
                Uuid::parse_str(&raw)
                    .map_err(|_| HttpError::BadRequest("Invalid listing ID format.".to_string()))?,
            ),
            None => None,
        };
        Ok((receiver, listing, content))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SendMessageRequest {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub listing_id: Option<String>,
    pub reviewee_id: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub rating: Option<Value>,
    pub comment: Option<String>,
}

/// A validated review submission
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewInput {
    pub listing: Uuid,
    pub reviewee: Uuid,
    pub rating: i64,
    pub comment: String,
}

impl CreateReviewRequest {
    /// Every rule is checked and all failures reported together
    pub fn into_input(self) -> HttpResult<ReviewInput> {
        let mut errors = Vec::new();

        let listing = parse_id(self.listing_id.as_deref());
        if listing.is_none() {
            errors.push(FieldError::new("listingId", "Invalid listing ID format."));
        }
        let reviewee = parse_id(self.reviewee_id.as_deref());
        if reviewee.is_none() {
            errors.push(FieldError::new("revieweeId", "Invalid reviewee ID format."));
        }
        let rating = self.rating.as_ref().and_then(lenient_int).filter(|r| (1..=5).contains(r));
        if rating.is_none() {
            errors.push(FieldError::new(
                "rating",
                "Rating must be an integer between 1 and 5.",
            ));
        }
        let comment = trimmed(self.comment).unwrap_or_default();
        let length = comment.chars().count();
        if !(5..=1000).contains(&length) {
            errors.push(FieldError::new(
                "comment",
                "Comment must be between 5 and 1000 characters.",
            ));
        }

        match (listing, reviewee, rating) {
            (Some(listing), Some(reviewee), Some(rating)) if errors.is_empty() => Ok(ReviewInput {
                listing,
                reviewee,
                rating,
                comment,
            }),
            _ => Err(HttpError::Validation(errors)),
        }
    }
}

fn parse_id(raw: Option<&str>) -> Option<Uuid> {
    raw.and_then(|v| Uuid::parse_str(v.trim()).ok())
}

/// Integers given as numbers (`4`, `4.0`) or numeric strings (`"4"`)
fn lenient_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse<T: serde::de::DeserializeOwned>(value: Value) -> T {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_signup_checks_presence_before_rules() {
        let req: SignupRequest = parse(json!({"name": "Ada", "email": "ada@example.com"}));
        let err = req.into_parts().unwrap_err();
        assert_eq!(err.to_string(), "Please provide name, email, and password!");

        let req: SignupRequest =
            parse(json!({"name": "A", "email": "nope", "password": "short"}));
        match req.into_parts().unwrap_err() {
            HttpError::Validation(fields) => {
                let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["email", "name", "password"]);
            }
            other => panic!("unexpected {other:?}"),
        }

        let req: SignupRequest = parse(
            json!({"name": "  Ada  ", "email": " Ada@Example.com ", "password": "analytical"}),
        );
        let (name, email, _) = req.into_parts().unwrap();
        assert_eq!(name, "Ada");
        assert_eq!(email, "ada@example.com");
    }

    #[test]
    fn test_update_me_refuses_password_fields() {
        let req: UpdateMeRequest = parse(json!({"name": "Ada", "passwordConfirm": null}));
        let err = req.into_patch().unwrap_err();
        assert_eq!(
            err.to_string(),
            "This route is not for password updates. Please use /updateMyPassword."
        );
    }

    #[test]
    fn test_update_me_patch() {
        let req: UpdateMeRequest = parse(json!({
            "bio": "",
            "skillsOffered": "cooking, , gardening",
            "coordinates": ["2.35", "48.85"],
        }));
        let patch = req.into_patch().unwrap();
        assert_eq!(patch.bio, Some(None));
        assert!(patch.location.is_none());
        assert_eq!(
            patch.skills_offered,
            Some(vec!["cooking".to_string(), "gardening".to_string()])
        );
        assert_eq!(patch.coordinates.unwrap().unwrap().latitude, 48.85);

        let req: UpdateMeRequest = parse(json!({"coordinates": null}));
        assert_eq!(req.into_patch().unwrap().coordinates, Some(None));
    }

    #[test]
    fn test_create_listing() {
        let req: CreateListingRequest = parse(json!({"title": "Guitar lessons"}));
        assert_eq!(
            req.into_new_listing().unwrap_err().to_string(),
            "Please provide listing type, title, description, and category."
        );

        let req: CreateListingRequest = parse(json!({
            "listingType": "Barter",
            "title": "Guitar lessons",
            "description": "Beginner friendly lessons",
            "category": "Music",
        }));
        match req.into_new_listing().unwrap_err() {
            HttpError::Validation(fields) => assert_eq!(fields[0].message, "Invalid listing type."),
            other => panic!("unexpected {other:?}"),
        }

        let req: CreateListingRequest = parse(json!({
            "listingType": "OfferSkill",
            "title": "Guitar lessons",
            "description": "Beginner friendly lessons",
            "category": "Music",
            "tags": ["music", " guitar "],
            "location": "",
            "coordinates": {"type": "Point", "coordinates": [2.35, 48.85]},
        }));
        let new = req.into_new_listing().unwrap();
        assert_eq!(new.tags, vec!["music", "guitar"]);
        assert!(new.location.is_none());
        assert_eq!(new.coordinates.unwrap().longitude, 2.35);
    }

    #[test]
    fn test_update_listing_patch() {
        let req: UpdateListingRequest = parse(json!({
            "status": "completed",
            "estimatedEffort": "",
            "deletePhotos": ["a", "b"],
        }));
        let patch = req.into_patch().unwrap();
        assert_eq!(patch.status, Some(ListingStatus::Completed));
        assert_eq!(patch.estimated_effort, Some(None));
        assert_eq!(patch.remove_photos, vec!["a", "b"]);
        assert!(patch.coordinates.is_none());

        let req: UpdateListingRequest = parse(json!({"status": "sold"}));
        assert!(req.into_patch().is_err());
        let req: UpdateListingRequest = parse(json!({"title": "Hey"}));
        assert!(matches!(req.into_patch(), Err(HttpError::Validation(_))));
    }

    #[test]
    fn test_start_conversation_ids() {
        let req: StartConversationRequest = parse(json!({"receiverId": "x"}));
        assert_eq!(
            req.into_parts().unwrap_err().to_string(),
            "Receiver and message content are required."
        );
        let req: StartConversationRequest =
            parse(json!({"receiverId": "not-a-uuid", "content": "hi"}));
        assert_eq!(req.into_parts().unwrap_err().to_string(), "Invalid receiver ID format.");

        let receiver = Uuid::new_v4();
        let req: StartConversationRequest =
            parse(json!({"receiverId": receiver.to_string(), "listingId": "", "content": " hi "}));
        assert_eq!(req.into_parts().unwrap(), (receiver, None, "hi".to_string()));
    }

    #[test]
    fn test_review_input_collects_every_error() {
        let req: CreateReviewRequest =
            parse(json!({"listingId": "bad", "revieweeId": "bad", "rating": 7, "comment": "ok"}));
        match req.into_input().unwrap_err() {
            HttpError::Validation(fields) => assert_eq!(fields.len(), 4),
            other => panic!("unexpected {other:?}"),
        }

        let listing = Uuid::new_v4();
        let reviewee = Uuid::new_v4();
        let req: CreateReviewRequest = parse(json!({
            "listingId": listing.to_string(),
            "revieweeId": reviewee.to_string(),
            "rating": "4",
            "comment": "  Great swap  ",
        }));
        let input = req.into_input().unwrap();
        assert_eq!(input.rating, 4);
        assert_eq!(input.comment, "Great swap");
        assert_eq!(lenient_int(&json!(3.0)), Some(3));
        assert_eq!(lenient_int(&json!(3.5)), None);
    }
}
