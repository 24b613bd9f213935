use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A completed "like" of a post by a user.
///
/// Only ever used for exclusion filtering, so repeated likes of the same
/// post collapse to set membership when the store is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interaction {
    pub user_id: i64,
    pub post_id: i64,
}

/// Precomputed features for one post.
///
/// `features` is the ordered list of named feature columns, excluding the
/// display fields `text` and `topic`. Every row in the post table must carry
/// the same columns in the same order; the store rejects anything else.
#[derive(Debug, Clone, PartialEq)]
pub struct PostFeatures {
    pub post_id: i64,
    pub text: String,
    pub topic: String,
    pub features: Vec<(String, f32)>,
}

/// Precomputed features for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserFeatures {
    pub user_id: i64,
    pub features: Vec<(String, f32)>,
}

/// Experiment arm a user is deterministically assigned to.
///
/// Recomputed per request from (user_id, salt); never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentBucket {
    Control,
    Test,
}

impl Display for ExperimentBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExperimentBucket::Control => write!(f, "control"),
            ExperimentBucket::Test => write!(f, "test"),
        }
    }
}

/// A post selected for recommendation, as returned to the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendedPost {
    pub id: i64,
    pub text: String,
    pub topic: String,
}

/// Response body for the recommendations endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub exp_group: ExperimentBucket,
    pub recommendations: Vec<RecommendedPost>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_display() {
        assert_eq!(format!("{}", ExperimentBucket::Control), "control");
        assert_eq!(format!("{}", ExperimentBucket::Test), "test");
    }

    #[test]
    fn test_bucket_serde_lowercase() {
        let json = serde_json::to_string(&ExperimentBucket::Test).unwrap();
        assert_eq!(json, r#""test""#);

        let bucket: ExperimentBucket = serde_json::from_str(r#""control""#).unwrap();
        assert_eq!(bucket, ExperimentBucket::Control);
    }

    #[test]
    fn test_response_wire_shape() {
        let response = RecommendationResponse {
            exp_group: ExperimentBucket::Control,
            recommendations: vec![RecommendedPost {
                id: 17,
                text: "Rust 1.80 released".to_string(),
                topic: "tech".to_string(),
            }],
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["exp_group"], "control");
        assert_eq!(json["recommendations"][0]["id"], 17);
        assert_eq!(json["recommendations"][0]["topic"], "tech");
    }
}
