//! Reviews and reviewee rating aggregates

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use axum::http::StatusCode;
use common::{TestApp, TestUser};
use serde_json::{json, Value};

struct Exchange {
    app: TestApp,
    host: TestUser,
    guests: Vec<TestUser>,
    listing: String,
}

async fn exchange(guests: usize) -> Exchange {
    let app = TestApp::new().await;
    let host = app.signup("Hana", "hana@example.com").await;
    let mut list = Vec::new();
    for i in 0..guests {
        list.push(
            app.signup(&format!("Guest {}", i), &format!("guest{}@example.com", i))
                .await,
        );
    }
    let listing = app.create_listing(&host, "Sourdough class").await;
    Exchange {
        app,
        host,
        guests: list,
        listing,
    }
}

async fn review(ex: &Exchange, guest: usize, rating: Value, comment: &str) -> (StatusCode, Value) {
    ex.app
        .post(
            "/api/v1/reviews",
            Some(&ex.guests[guest].token),
            json!({
                "listingId": ex.listing,
                "revieweeId": ex.host.id,
                "rating": rating,
                "comment": comment,
            }),
        )
        .await
}

#[tokio::test]
async fn test_create_review_updates_rating() {
    let ex = exchange(2).await;

    let (status, body) = review(&ex, 0, json!(4), "Great bread, thank you").await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["review"]["rating"], 4);
    assert_eq!(body["data"]["review"]["reviewer"]["name"], "Guest 0");

    let (status, _) = review(&ex, 1, json!("5"), "Wonderful instructor").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = ex
        .app
        .get(&format!("/api/v1/reviews/user/{}", ex.host.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 2);
    assert_eq!(body["data"]["reviewee"]["averageRating"], 4.5);
    assert_eq!(body["data"]["reviewee"]["numReviews"], 2);

    let (_, body) = ex
        .app
        .get(&format!("/api/v1/users/{}", ex.host.id), None)
        .await;
    assert_eq!(body["data"]["user"]["averageRating"], 4.5);

    let (_, body) = ex
        .app
        .get(
            &format!("/api/v1/reviews/listing/{}?sort=-rating", ex.listing),
            None,
        )
        .await;
    assert_eq!(body["data"]["listing"]["title"], "Sourdough class");
    assert_eq!(body["data"]["listing"]["user"], ex.host.id.as_str());
    assert_eq!(body["data"]["reviews"][0]["rating"], 5);

    let (_, body) = ex
        .app
        .get(&format!("/api/v1/reviews/user/{}?rating[gte]=5", ex.host.id), None)
        .await;
    assert_eq!(body["results"], 1);
}

#[tokio::test]
async fn test_review_validation_details() {
    let ex = exchange(1).await;
    let (status, body) = ex
        .app
        .post(
            "/api/v1/reviews",
            Some(&ex.guests[0].token),
            json!({"listingId": "x", "revieweeId": ex.host.id, "rating": 9, "comment": "meh"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "Validation Error");
    assert_eq!(
        body["details"],
        json!([
            {"field": "listingId", "message": "Invalid listing ID format."},
            {"field": "rating", "message": "Rating must be an integer between 1 and 5."},
            {"field": "comment", "message": "Comment must be between 5 and 1000 characters."},
        ])
    );
}

#[tokio::test]
async fn test_review_business_rules() {
    let ex = exchange(1).await;

    let (status, body) = ex
        .app
        .post(
            "/api/v1/reviews",
            Some(&ex.host.token),
            json!({"listingId": ex.listing, "revieweeId": ex.host.id, "rating": 5, "comment": "I am great"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "You cannot review yourself.");

    let (status, body) = ex
        .app
        .post(
            "/api/v1/reviews",
            Some(&ex.guests[0].token),
            json!({"listingId": ex.listing, "revieweeId": uuid::Uuid::new_v4(), "rating": 5, "comment": "Who is this"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User being reviewed (reviewee) not found.");

    let (status, _) = review(&ex, 0, json!(3), "Decent bread").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = review(&ex, 0, json!(5), "Changed my mind").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "You have already reviewed this user for this listing."
    );

    let (status, _) = ex.app.post("/api/v1/reviews", None, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = ex
        .app
        .get(&format!("/api/v1/reviews/user/{}", uuid::Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No user found with that ID.");
}

#[tokio::test]
async fn test_delete_review_recomputes_rating() {
    let ex = exchange(1).await;
    let (_, body) = review(&ex, 0, json!(2), "Bread was burnt").await;
    let id = body["data"]["review"]["_id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/reviews/{}", id);

    let (status, body) = ex.app.delete(&uri, Some(&ex.host.token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "You do not have permission to perform this action."
    );

    let (status, _) = ex.app.delete(&uri, Some(&ex.guests[0].token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = ex
        .app
        .get(&format!("/api/v1/reviews/user/{}", ex.host.id), None)
        .await;
    assert_eq!(body["results"], 0);
    assert_eq!(body["data"]["reviewee"]["averageRating"], 0.0);
    assert_eq!(body["data"]["reviewee"]["numReviews"], 0);

    let (status, body) = ex.app.delete(&uri, Some(&ex.guests[0].token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No review found with that ID.");
}
