pub mod experiment;
pub mod recommender;
pub mod scoring;
pub mod store;

pub use recommender::Recommender;
pub use scoring::ModelRegistry;
pub use store::{FeatureSource, FeatureStore};
