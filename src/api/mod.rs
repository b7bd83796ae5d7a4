pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::config::Config;
use crate::ml::ModelRegistry;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(registry: Arc<ModelRegistry>, config: Arc<Config>) -> Self {
        Self { registry, config }
    }
}
