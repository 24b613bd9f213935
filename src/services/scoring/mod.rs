use std::path::Path;
use std::sync::Arc;

use ndarray::{Array1, ArrayView2};

use crate::error::AppResult;
use crate::models::ExperimentBucket;
use crate::services::store::FeatureSchema;

mod model;

pub use model::LogisticModel;

/// A predictive model mapping combined feature rows to like probabilities.
///
/// `predict` is batched on purpose: one call over every candidate post
/// amortizes invocation overhead across the whole table. Implementations
/// are stateless per call and perform no I/O.
pub trait Scorer: Send + Sync {
    /// One probability in [0, 1] per input row, order-preserving
    fn predict(&self, features: ArrayView2<'_, f32>) -> AppResult<Array1<f32>>;
}

/// One scorer per experiment bucket, loaded once at startup.
///
/// Routing is a total match over the bucket enum, so adding a bucket means
/// adding a variant and an artifact, not another conditional chain.
pub struct ModelRegistry {
    control: Arc<dyn Scorer>,
    test: Arc<dyn Scorer>,
}

impl ModelRegistry {
    /// Builds a registry from already-constructed scorers (fixtures, tests)
    pub fn from_parts(control: Arc<dyn Scorer>, test: Arc<dyn Scorer>) -> Self {
        Self { control, test }
    }

    /// Loads the per-bucket model artifacts from `model_dir`.
    ///
    /// Expects `model_control.json` and `model_test.json`, each validated
    /// against the store's schema. A missing or mismatched artifact is a
    /// configuration error: the process must refuse to start rather than
    /// serve one bucket with a broken model.
    pub fn load(model_dir: &Path, schema: &FeatureSchema) -> AppResult<Self> {
        Ok(Self {
            control: Self::load_bucket(model_dir, ExperimentBucket::Control, schema)?,
            test: Self::load_bucket(model_dir, ExperimentBucket::Test, schema)?,
        })
    }

    fn load_bucket(
        model_dir: &Path,
        bucket: ExperimentBucket,
        schema: &FeatureSchema,
    ) -> AppResult<Arc<dyn Scorer>> {
        let path = model_dir.join(format!("model_{}.json", bucket));
        tracing::info!(bucket = %bucket, path = %path.display(), "Loading model");
        Ok(Arc::new(LogisticModel::load(&path, schema)?))
    }

    pub fn scorer_for(&self, bucket: ExperimentBucket) -> &dyn Scorer {
        match bucket {
            ExperimentBucket::Control => self.control.as_ref(),
            ExperimentBucket::Test => self.test.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    struct ConstantScorer(f32);

    impl Scorer for ConstantScorer {
        fn predict(&self, features: ArrayView2<'_, f32>) -> AppResult<Array1<f32>> {
            Ok(Array1::from_elem(features.nrows(), self.0))
        }
    }

    #[test]
    fn test_registry_routes_by_bucket() {
        let registry = ModelRegistry::from_parts(
            Arc::new(ConstantScorer(0.25)),
            Arc::new(ConstantScorer(0.75)),
        );

        let rows = Array2::zeros((3, 2));
        let control = registry
            .scorer_for(ExperimentBucket::Control)
            .predict(rows.view())
            .unwrap();
        let test = registry
            .scorer_for(ExperimentBucket::Test)
            .predict(rows.view())
            .unwrap();

        assert!(control.iter().all(|&p| (p - 0.25).abs() < f32::EPSILON));
        assert!(test.iter().all(|&p| (p - 0.75).abs() < f32::EPSILON));
        assert_eq!(control.len(), 3);
    }
}
