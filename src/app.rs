//! Application assembly: shared state, module registration and the serve loop.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use thebook_db::{Fixtures, MemoryStore, Repository};
use thebook_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;
use crate::utils::{LocalMediaStorage, MediaStorage};

/// Collaborators every page handler reaches through router state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Repository>,
    pub media: Arc<dyn MediaStorage>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Repository>,
        media: Arc<dyn MediaStorage>,
        settings: Settings,
    ) -> Self {
        Self {
            store,
            media,
            settings: Arc::new(settings),
        }
    }

    /// Empty in-memory store seeded from `database.fixtures` when configured.
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let store = MemoryStore::new();
        if let Some(path) = settings.database.fixtures.as_deref() {
            Fixtures::from_path(path)?
                .load_into(&store)
                .with_context(|| format!("failed to load fixtures from {}", path))?;
        }

        let media = LocalMediaStorage::from_settings(&settings.media);
        Ok(Self::new(Arc::new(store), Arc::new(media), settings))
    }

    pub fn page_size(&self) -> usize {
        self.settings.pagination.page_size
    }
}

/// Registry holding the `auth` core module and the `posts` custom module.
pub fn registry(state: &AppState) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, state);
    registry
}

/// Fully layered router for `state`, as served.
pub fn router(state: &AppState) -> Router {
    thebook_http::build_router(&registry(state), &state.settings)
}

/// Run the module lifecycle around the HTTP server until shutdown.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let state = AppState::from_settings(settings)?;
    let registry = registry(&state);
    let ctx = InitCtx {
        settings: &state.settings,
    };

    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    let served = thebook_http::start_server(&registry, &state.settings).await;

    registry.stop_all().await?;
    served
}
