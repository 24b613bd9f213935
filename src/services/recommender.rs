use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime, Timelike};
use ndarray::Array2;

use crate::error::{AppError, AppResult};
use crate::models::{RecommendationResponse, RecommendedPost};
use crate::services::experiment;
use crate::services::scoring::ModelRegistry;
use crate::services::store::FeatureStore;

/// Per-request scored post, consumed during ranking
struct ScoredCandidate {
    post_id: i64,
    probability: f32,
}

/// Orchestrates one recommendation request: bucket assignment, feature
/// join, batched scoring, exclusion of already-liked posts, ranking and
/// top-K selection.
///
/// Holds only shared read-only state, so a single instance serves all
/// concurrent requests without locking.
pub struct Recommender {
    store: Arc<FeatureStore>,
    registry: Arc<ModelRegistry>,
    salt: String,
}

impl Recommender {
    pub fn new(store: Arc<FeatureStore>, registry: Arc<ModelRegistry>, salt: String) -> Self {
        Self {
            store,
            registry,
            salt,
        }
    }

    pub fn recommend(
        &self,
        user_id: i64,
        at: NaiveDateTime,
        limit: i64,
    ) -> AppResult<RecommendationResponse> {
        let bucket = experiment::assign(user_id, &self.salt);
        let scorer = self.registry.scorer_for(bucket);

        tracing::debug!(user_id, bucket = %bucket, limit, "Scoring recommendation request");

        let user_values = self
            .store
            .user_features(user_id)
            .ok_or_else(|| AppError::NotFound(format!("user {} has no feature row", user_id)))?;

        let posts = self.store.posts();
        if limit <= 0 || posts.is_empty() {
            return Ok(RecommendationResponse {
                exp_group: bucket,
                recommendations: Vec::new(),
            });
        }

        // One combined row per post: post columns, user columns, calendar
        // columns, in schema order. Collisions were rejected at load time,
        // so this is a fixed-shape concatenation.
        let width = self.store.schema().width();
        let time_values = [
            at.hour() as f32,
            at.weekday().num_days_from_monday() as f32,
            at.month() as f32,
        ];
        let mut flat = Vec::with_capacity(posts.len() * width);
        for post in posts {
            flat.extend_from_slice(&post.values);
            flat.extend_from_slice(user_values);
            flat.extend_from_slice(&time_values);
        }
        let matrix = Array2::from_shape_vec((posts.len(), width), flat)
            .map_err(|e| AppError::Internal(format!("feature matrix shape error: {}", e)))?;

        // Single batched inference call over every candidate post.
        let probabilities = scorer.predict(matrix.view())?;
        if probabilities.len() != posts.len() {
            return Err(AppError::DataIntegrity(format!(
                "scorer returned {} probabilities for {} posts",
                probabilities.len(),
                posts.len()
            )));
        }

        let liked = self.store.liked_by(user_id);
        let mut candidates: Vec<ScoredCandidate> = posts
            .iter()
            .zip(probabilities.iter())
            .filter(|(post, _)| !liked.is_some_and(|set| set.contains(&post.post_id)))
            .map(|(post, &probability)| ScoredCandidate {
                post_id: post.post_id,
                probability,
            })
            .collect();

        // Highest predicted probability first; ties broken by post id so
        // identical inputs always produce identical output.
        candidates.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.post_id.cmp(&b.post_id))
        });
        candidates.truncate(limit as usize);

        let recommendations = candidates
            .iter()
            .map(|candidate| {
                let post = self.store.post(candidate.post_id).ok_or_else(|| {
                    AppError::DataIntegrity(format!(
                        "scored post {} missing from post table",
                        candidate.post_id
                    ))
                })?;
                Ok(RecommendedPost {
                    id: post.post_id,
                    text: post.text.clone(),
                    topic: post.topic.clone(),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        tracing::debug!(
            user_id,
            returned = recommendations.len(),
            "Recommendations assembled"
        );

        Ok(RecommendationResponse {
            exp_group: bucket,
            recommendations,
        })
    }
}
