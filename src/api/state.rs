use std::sync::Arc;

use crate::services::Recommender;

/// Shared application state.
///
/// Everything behind the `Arc` is immutable after startup: the feature
/// store and model registry are fully built before the router exists, so
/// request handlers never observe partially-initialized state and never
/// take a lock.
#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<Recommender>,
}

impl AppState {
    pub fn new(recommender: Arc<Recommender>) -> Self {
        Self { recommender }
    }
}
