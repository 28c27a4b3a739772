//! Router builder for the HTTP server

use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode},
    routing::MethodRouter,
    Router,
};
use std::time::Duration;
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore as SessionStore, SessionManagerLayer};
use uuid::{Timestamp, Uuid};

use thebook_kernel::settings::{AuthSettings, MediaSettings};

use crate::error::AppError;

/// Session cookie name
pub const SESSION_COOKIE: &str = "thebook-session";

/// Builder for constructing the main HTTP router.
///
/// Layers are applied in `build`, after every route is in place, so they cover
/// the whole tree regardless of call order.
pub struct RouterBuilder {
    router: Router,
    tracing: bool,
    request_id: bool,
    timeout: Option<Duration>,
    sessions: Option<AuthSettings>,
}

impl RouterBuilder {
    /// Create a new router builder
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            tracing: false,
            request_id: false,
            timeout: None,
            sessions: None,
        }
    }

    /// Add a route to the router
    pub fn route(mut self, path: &str, route: MethodRouter) -> Self {
        self.router = self.router.route(path, route);
        self
    }

    /// Mount a module's router under `mount_path`; `"/"` merges at the root
    pub fn mount_module(mut self, mount_path: &str, module_router: Router) -> Self {
        self.router = if mount_path == "/" || mount_path.is_empty() {
            self.router.merge(module_router)
        } else {
            self.router
                .nest(mount_path.trim_end_matches('/'), module_router)
        };
        self
    }

    /// Serve uploaded files from the media root
    pub fn with_media(mut self, media: &MediaSettings) -> Self {
        let prefix = format!("/{}", media.url_prefix.trim_matches('/'));
        self.router = self
            .router
            .nest_service(&prefix, ServeDir::new(&media.root));
        self
    }

    /// Add tracing middleware
    pub fn with_tracing(mut self) -> Self {
        self.tracing = true;
        self
    }

    /// Add request ID middleware
    pub fn with_request_id(mut self) -> Self {
        self.request_id = true;
        self
    }

    /// Add timeout middleware
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(Duration::from_millis(timeout_ms));
        self
    }

    /// Add cookie sessions backed by an in-process store
    pub fn with_sessions(mut self, auth: &AuthSettings) -> Self {
        self.sessions = Some(auth.clone());
        self
    }

    /// Build the final router
    pub fn build(self) -> Router {
        let mut router = self.router.fallback(not_found);

        if let Some(auth) = self.sessions {
            let layer = SessionManagerLayer::new(SessionStore::default())
                .with_name(SESSION_COOKIE)
                .with_secure(auth.secure_cookies)
                .with_http_only(true)
                .with_same_site(SameSite::Lax)
                .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
                    auth.session_ttl_minutes,
                )));
            router = router.layer(layer);
        }
        if let Some(timeout) = self.timeout {
            router = router.layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                timeout,
            ));
        }
        if self.tracing {
            router = router.layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().include_headers(true))
                    .on_request(DefaultOnRequest::new().level(tracing::Level::INFO))
                    .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
            );
        }
        if self.request_id {
            router = router
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));
        }

        router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Fallback for paths no route matches
async fn not_found() -> AppError {
    AppError::not_found("The requested page does not exist")
}

/// Request ID generator for tracing
#[derive(Clone)]
struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let timestamp = Timestamp::now(uuid::NoContext);
        let request_id = Uuid::new_v7(timestamp)
            .to_string()
            .parse::<HeaderValue>()
            .ok()?;
        Some(RequestId::new(request_id))
    }
}
