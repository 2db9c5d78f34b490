pub mod config;
pub mod error;
pub mod llm;
pub mod render;
pub mod routes;
pub mod telemetry;

use std::sync::Arc;

pub use config::Config;

use llm::ProviderRouter;
use render::DocumentRenderer;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ProviderRouter>,
    pub renderer: DocumentRenderer,
}
