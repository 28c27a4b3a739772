//! Posts, groups, books and comments: the public pages of the site.

pub mod forms;
pub mod routes;
pub mod templates;
pub mod urls;
pub mod views;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use thebook_kernel::{InitCtx, Module};

use crate::app::AppState;

pub struct PostsModule {
    state: AppState,
}

impl PostsModule {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for PostsModule {
    fn name(&self) -> &'static str {
        "posts"
    }

    /// Pages live at the site root.
    fn mount_path(&self) -> String {
        "/".to_string()
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            page_size = ctx.settings.pagination.page_size,
            edit_policy = ?ctx.settings.books.edit_policy,
            "posts module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "posts module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "posts module stopped");
        Ok(())
    }
}

pub fn create_module(state: AppState) -> Arc<dyn Module> {
    Arc::new(PostsModule::new(state))
}
