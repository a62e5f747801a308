use crate::collector::service::CollectionService;
use crate::config::Configuration;
use axum::extract::FromRef;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub configuration: Arc<Configuration>,
    pub service: Arc<CollectionService>,
}

impl FromRef<AppState> for Arc<CollectionService> {
    fn from_ref(state: &AppState) -> Self {
        state.service.clone()
    }
}
