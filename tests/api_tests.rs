use std::sync::Arc;

use axum_test::TestServer;

use feedrec_api::api::{create_router, AppState};
use feedrec_api::models::{Interaction, PostFeatures, UserFeatures};
use feedrec_api::services::scoring::LogisticModel;
use feedrec_api::services::{FeatureStore, ModelRegistry, Recommender};

fn post(post_id: i64, quality: f32, topic: &str) -> PostFeatures {
    PostFeatures {
        post_id,
        text: format!("post {}", post_id),
        topic: topic.to_string(),
        features: vec![("quality".to_string(), quality)],
    }
}

fn user(user_id: i64) -> UserFeatures {
    UserFeatures {
        user_id,
        features: vec![("age".to_string(), 30.0)],
    }
}

/// Server over a fixture snapshot: posts 1..=10 with quality rising with
/// post id, users 42 and 7, user 7 has liked posts 1..=8.
fn create_test_server() -> TestServer {
    let interactions: Vec<Interaction> = (1..=8)
        .map(|post_id| Interaction { user_id: 7, post_id })
        .collect();
    let posts = (1..=10).map(|id| post(id, id as f32, "tech")).collect();
    let store =
        Arc::new(FeatureStore::build(interactions, posts, vec![user(42), user(7)]).unwrap());

    let weights = [
        ("quality", 1.0),
        ("age", 0.0),
        ("hour", 0.0),
        ("dayofweek", 0.0),
        ("month", 0.0),
    ];
    let model = || {
        Arc::new(LogisticModel::from_weights(0.0, &weights, store.schema()).unwrap())
    };
    let registry = Arc::new(ModelRegistry::from_parts(model(), model()));

    let recommender = Recommender::new(store, registry, "exp-v1".to_string());
    let state = AppState::new(Arc::new(recommender));
    let app = create_router(state);
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_recommendations_happy_path() {
    let server = create_test_server();

    let response = server
        .get("/post/recommendations")
        .add_query_param("id", 42)
        .add_query_param("time", "2024-06-03T15:30:00")
        .add_query_param("limit", 5)
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();

    // Experiment group is one of the two buckets.
    let exp_group = body["exp_group"].as_str().unwrap();
    assert!(exp_group == "control" || exp_group == "test");

    // Highest-quality posts first, exactly `limit` of them.
    let recommendations = body["recommendations"].as_array().unwrap();
    assert_eq!(recommendations.len(), 5);
    let ids: Vec<i64> = recommendations
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![10, 9, 8, 7, 6]);
    assert_eq!(recommendations[0]["topic"], "tech");
    assert_eq!(recommendations[0]["text"], "post 10");
}

#[tokio::test]
async fn test_recommendations_exclude_liked_posts() {
    let server = create_test_server();

    let response = server
        .get("/post/recommendations")
        .add_query_param("id", 7)
        .add_query_param("time", "2024-06-03T15:30:00")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let ids: Vec<i64> = body["recommendations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();

    // User 7 liked 1..=8; only 9 and 10 remain.
    assert_eq!(ids, vec![10, 9]);
}

#[tokio::test]
async fn test_default_limit_is_ten() {
    let server = create_test_server();

    let response = server
        .get("/post/recommendations")
        .add_query_param("id", 42)
        .add_query_param("time", "2024-06-03T15:30:00")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["recommendations"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let server = create_test_server();

    let response = server
        .get("/post/recommendations")
        .add_query_param("id", 999)
        .add_query_param("time", "2024-06-03T15:30:00")
        .await;

    response.assert_status(axum::http::StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("999"));
}

#[tokio::test]
async fn test_zero_limit_returns_empty() {
    let server = create_test_server();

    let response = server
        .get("/post/recommendations")
        .add_query_param("id", 42)
        .add_query_param("time", "2024-06-03T15:30:00")
        .add_query_param("limit", 0)
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["recommendations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_offset_suffixed_time_accepted() {
    let server = create_test_server();

    let naive: serde_json::Value = server
        .get("/post/recommendations")
        .add_query_param("id", 42)
        .add_query_param("time", "2024-06-03T15:30:00")
        .add_query_param("limit", 5)
        .await
        .json();

    // The same instant written with a UTC suffix must be accepted and
    // produce the same recommendations.
    let response = server
        .get("/post/recommendations")
        .add_query_param("id", 42)
        .add_query_param("time", "2024-06-03T15:30:00Z")
        .add_query_param("limit", 5)
        .await;

    response.assert_status_ok();
    let suffixed: serde_json::Value = response.json();
    assert_eq!(naive, suffixed);
}

#[tokio::test]
async fn test_malformed_query_is_bad_request() {
    let server = create_test_server();

    let response = server
        .get("/post/recommendations")
        .add_query_param("id", "not-a-number")
        .add_query_param("time", "2024-06-03T15:30:00")
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_identical_requests_identical_responses() {
    let server = create_test_server();

    let get = || {
        server
            .get("/post/recommendations")
            .add_query_param("id", 42)
            .add_query_param("time", "2024-06-03T15:30:00")
            .add_query_param("limit", 5)
    };

    let first: serde_json::Value = get().await.json();
    let second: serde_json::Value = get().await.json();
    assert_eq!(first, second);
}
