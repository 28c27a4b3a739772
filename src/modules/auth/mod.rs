//! Caller identity.
//!
//! Every request passes through [`resolve_identity`], which turns the session into
//! an [`Identity`] request extension. [`login_required`] is the route guard for pages
//! that need a signed-in caller. With `auth.dev_login` enabled the module also
//! serves a username-only login form in place of the external identity provider.

use std::sync::Arc;

use askama::Template;
use async_trait::async_trait;
use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::{Deserialize, Serialize};
use thebook_authz::{login_redirect, safe_next, Identity};
use thebook_db::{NewUser, StoreError};
use thebook_http::error::AppError;
use thebook_kernel::{InitCtx, Module};
use tower_sessions::Session;

use crate::app::AppState;
use crate::modules::posts::urls;

/// Session key holding the signed-in [`SessionUser`].
pub const SESSION_USER_KEY: &str = "auth.user";

const USERNAME_MAX_LENGTH: usize = 150;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionUser {
    id: i64,
    username: String,
}

/// Who is looking at a page, as every template needs it, plus the site navigation.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub is_authenticated: bool,
    pub username: String,
    pub profile_url: String,
    pub login_url: String,
    pub can_logout: bool,
    pub home_url: String,
    pub books_url: String,
    pub post_create_url: String,
    pub book_create_url: String,
}

impl Viewer {
    pub fn new(identity: &Identity, state: &AppState) -> Self {
        let auth = &state.settings.auth;
        let mut viewer = Self {
            login_url: auth.login_url.clone(),
            home_url: urls::index(),
            books_url: urls::books(),
            post_create_url: urls::post_create(),
            book_create_url: urls::book_create(),
            ..Self::default()
        };
        if let Some(user) = identity.as_user() {
            viewer.is_authenticated = true;
            viewer.username = user.username.clone();
            viewer.profile_url = urls::profile(&user.username);
            viewer.can_logout = auth.dev_login;
        }
        viewer
    }
}

/// Attach the caller's [`Identity`] to the request.
///
/// A session naming a user that no longer exists is treated as anonymous.
pub async fn resolve_identity(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = match session.get::<SessionUser>(SESSION_USER_KEY).await {
        Ok(Some(stored)) => match state.store.user(stored.id) {
            Ok(user) if user.username == stored.username => Identity::user(user.id, user.username),
            Ok(_) | Err(StoreError::NotFound { .. }) => {
                tracing::debug!(user_id = stored.id, "session names a missing user");
                Identity::Anonymous
            }
            Err(err) => return AppError::from(err).into_response(),
        },
        Ok(None) => Identity::Anonymous,
        Err(err) => {
            tracing::warn!(%err, "session could not be read");
            Identity::Anonymous
        }
    };

    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// Send anonymous callers to the login page, remembering where they were going.
pub async fn login_required(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let authenticated = request
        .extensions()
        .get::<Identity>()
        .is_some_and(Identity::is_authenticated);
    if authenticated {
        return next.run(request).await;
    }

    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    tracing::debug!(target, "anonymous request to protected page");
    Redirect::to(&login_redirect(&state.settings.auth.login_url, target)).into_response()
}

#[derive(Template)]
#[template(path = "auth/login.html")]
struct LoginTemplate {
    viewer: Viewer,
    next: String,
    username: String,
    error: String,
    has_error: bool,
}

#[derive(Debug, Default, Deserialize)]
struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    next: Option<String>,
}

fn username_error(username: &str) -> Option<&'static str> {
    if username.is_empty() {
        return Some("This field is required.");
    }
    let valid = username.chars().count() <= USERNAME_MAX_LENGTH
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if valid {
        None
    } else {
        Some("Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.")
    }
}

async fn login_page(
    State(state): State<AppState>,
    Query(query): Query<NextQuery>,
) -> Result<Html<String>, AppError> {
    let page = LoginTemplate {
        viewer: Viewer::new(&Identity::Anonymous, &state),
        next: safe_next(query.next.as_deref()).to_string(),
        username: String::new(),
        error: String::new(),
        has_error: false,
    };
    Ok(Html(page.render()?))
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let username = form.username.trim();
    let next = safe_next(form.next.as_deref()).to_string();

    if let Some(error) = username_error(username) {
        let page = LoginTemplate {
            viewer: Viewer::new(&Identity::Anonymous, &state),
            next,
            username: username.to_string(),
            error: error.to_string(),
            has_error: true,
        };
        return Ok(Html(page.render()?).into_response());
    }

    let user = match state.store.user_by_username(username) {
        Ok(user) => user,
        Err(StoreError::NotFound { .. }) => {
            let user = state.store.create_user(NewUser::named(username))?;
            tracing::info!(user_id = user.id, username = %user.username, "user mirrored on first login");
            user
        }
        Err(err) => return Err(err.into()),
    };

    session.cycle_id().await.map_err(anyhow::Error::new)?;
    session
        .insert(
            SESSION_USER_KEY,
            SessionUser {
                id: user.id,
                username: user.username.clone(),
            },
        )
        .await
        .map_err(anyhow::Error::new)?;

    tracing::info!(user_id = user.id, "signed in");
    Ok(Redirect::to(&next).into_response())
}

async fn logout(session: Session) -> Result<Redirect, AppError> {
    session.flush().await.map_err(anyhow::Error::new)?;
    Ok(Redirect::to("/"))
}

pub struct AuthModule {
    state: AppState,
}

impl AuthModule {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            login_url = %ctx.settings.auth.login_url,
            dev_login = ctx.settings.auth.dev_login,
            "auth module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        if !self.state.settings.auth.dev_login {
            return Router::new();
        }
        Router::new()
            .route("/login/", get(login_page).post(login))
            .route("/logout/", get(logout).post(logout))
            .with_state(self.state.clone())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "auth module stopped");
        Ok(())
    }
}

pub fn create_module(state: AppState) -> Arc<dyn Module> {
    Arc::new(AuthModule::new(state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_follow_identity_provider_rules() {
        assert!(username_error("leo.tolstoy+1@x").is_none());
        assert!(username_error("").is_some());
        assert!(username_error("two words").is_some());
        assert!(username_error(&"a".repeat(USERNAME_MAX_LENGTH + 1)).is_some());
    }
}
