use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::models::RecommendationResponse;

use super::AppState;

/// Query parameters for the recommendations endpoint
#[derive(Debug, Deserialize)]
pub struct RecommendationParams {
    pub id: i64,
    /// ISO-8601 timestamp the recommendation is being made for; an offset
    /// suffix is accepted and normalized to UTC
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub time: NaiveDateTime,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(with_offset.naive_utc());
    }
    raw.parse::<NaiveDateTime>().map_err(serde::de::Error::custom)
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Serves personalized post recommendations for one user
pub async fn recommended_posts(
    State(state): State<AppState>,
    Query(params): Query<RecommendationParams>,
) -> AppResult<Json<RecommendationResponse>> {
    let response = state
        .recommender
        .recommend(params.id, params.time, params.limit)?;
    Ok(Json(response))
}
