use std::collections::HashMap;
use std::path::Path;

use ndarray::{Array1, ArrayView2};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::services::store::FeatureSchema;

use super::Scorer;

/// On-disk shape of a model artifact: an intercept plus one weight per
/// combined-row column, keyed by column name.
#[derive(Debug, Deserialize)]
struct ModelArtifact {
    bias: f32,
    weights: HashMap<String, f32>,
}

/// Logistic regression scorer.
///
/// Weights are resolved against the feature schema once at load time, so
/// `predict` is a single matrix-vector product with no name lookups.
pub struct LogisticModel {
    weights: Array1<f32>,
    bias: f32,
}

impl LogisticModel {
    /// Loads and validates an artifact against the store's schema.
    pub fn load(path: &Path, schema: &FeatureSchema) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read model artifact {}: {}", path.display(), e))
        })?;
        let artifact: ModelArtifact = serde_json::from_str(&raw).map_err(|e| {
            AppError::Config(format!("malformed model artifact {}: {}", path.display(), e))
        })?;

        Self::from_artifact(artifact, schema)
    }

    /// Builds a model from explicit named weights (fixtures, tests).
    pub fn from_weights(
        bias: f32,
        weights: &[(&str, f32)],
        schema: &FeatureSchema,
    ) -> AppResult<Self> {
        Self::from_artifact(
            ModelArtifact {
                bias,
                weights: weights
                    .iter()
                    .map(|(name, w)| (name.to_string(), *w))
                    .collect(),
            },
            schema,
        )
    }

    fn from_artifact(mut artifact: ModelArtifact, schema: &FeatureSchema) -> AppResult<Self> {
        let mut aligned = Vec::with_capacity(schema.width());
        for column in schema.columns() {
            let weight = artifact.weights.remove(column).ok_or_else(|| {
                AppError::Config(format!("model artifact has no weight for column '{}'", column))
            })?;
            aligned.push(weight);
        }

        if let Some(unknown) = artifact.weights.keys().next() {
            return Err(AppError::Config(format!(
                "model artifact references unknown column '{}'",
                unknown
            )));
        }

        Ok(Self {
            weights: Array1::from_vec(aligned),
            bias: artifact.bias,
        })
    }
}

impl Scorer for LogisticModel {
    fn predict(&self, features: ArrayView2<'_, f32>) -> AppResult<Array1<f32>> {
        if features.ncols() != self.weights.len() {
            return Err(AppError::Internal(format!(
                "feature matrix has {} columns, model expects {}",
                features.ncols(),
                self.weights.len()
            )));
        }

        let logits = features.dot(&self.weights) + self.bias;
        Ok(logits.mapv(sigmoid))
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
