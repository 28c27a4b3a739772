//! Axum adapters for the page handlers and the route table.

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    middleware,
    routing::{get, post, MethodRouter},
    Extension, Router,
};
use thebook_authz::Identity;
use thebook_db::is_valid_slug;
use thebook_http::error::AppError;

use super::urls::Route;
use super::views::{self, PageResult};
use crate::app::AppState;
use crate::modules::auth::{login_required, resolve_identity};
use crate::utils::{FormData, PageQuery};

/// Room for the text fields sent alongside an upload.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Integer path segment; anything else is a missing page.
fn id_param(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::not_found(format!("no page for id '{}'", raw)))
}

fn slug_param(raw: &str) -> Result<&str, AppError> {
    if is_valid_slug(raw) {
        Ok(raw)
    } else {
        Err(AppError::not_found(format!("no group '{}'", raw)))
    }
}

async fn index(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<PageQuery>,
) -> PageResult {
    views::index(&state, &identity, query.number())
}

async fn group_list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> PageResult {
    views::group_list(&state, &identity, slug_param(&slug)?, query.number())
}

async fn book_list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(book_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> PageResult {
    views::book_list(&state, &identity, id_param(&book_id)?, query.number())
}

async fn books(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<PageQuery>,
) -> PageResult {
    views::books(&state, &identity, query.number())
}

async fn profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> PageResult {
    views::profile(&state, &identity, &username, query.number())
}

async fn post_detail(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(post_id): Path<String>,
) -> PageResult {
    views::post_detail(&state, &identity, id_param(&post_id)?)
}

async fn post_create_form(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> PageResult {
    views::post_create_form(&state, &identity)
}

async fn post_create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    data: FormData,
) -> PageResult {
    views::post_create(&state, &identity, data).await
}

async fn post_edit_form(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(post_id): Path<String>,
) -> PageResult {
    views::post_edit_form(&state, &identity, id_param(&post_id)?)
}

async fn post_edit(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(post_id): Path<String>,
    data: FormData,
) -> PageResult {
    views::post_edit(&state, &identity, id_param(&post_id)?, data).await
}

async fn book_create_form(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> PageResult {
    views::book_create_form(&state, &identity)
}

async fn book_create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    data: FormData,
) -> PageResult {
    views::book_create(&state, &identity, data).await
}

async fn book_edit_form(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(book_id): Path<String>,
) -> PageResult {
    views::book_edit_form(&state, &identity, id_param(&book_id)?)
}

async fn book_edit(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(book_id): Path<String>,
    data: FormData,
) -> PageResult {
    views::book_edit(&state, &identity, id_param(&book_id)?, data).await
}

async fn add_comment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(post_id): Path<String>,
    data: FormData,
) -> PageResult {
    views::add_comment(&state, &identity, id_param(&post_id)?, data)
}

/// Handlers serving each named route.
fn handlers(route: Route) -> MethodRouter<AppState> {
    match route {
        Route::Index => get(index),
        Route::GroupList => get(group_list),
        Route::BookList => get(book_list),
        Route::Profile => get(profile),
        Route::PostDetail => get(post_detail),
        Route::Books => get(books),
        Route::PostCreate => get(post_create_form).post(post_create),
        Route::PostEdit => get(post_edit_form).post(post_edit),
        Route::BookEdit => get(book_edit_form).post(book_edit),
        Route::BookCreate => get(book_create_form).post(book_create),
        Route::AddComment => post(add_comment),
    }
}

/// Route table. Routes that require login sit behind the `login_required` guard,
/// and every page sees the caller's identity.
pub fn router(state: AppState) -> Router {
    let mut public = Router::new();
    let mut protected = Router::new();
    for route in Route::ALL {
        tracing::debug!(
            route = route.name(),
            path = route.pattern(),
            login_required = route.requires_login(),
            "mounting route"
        );
        if route.requires_login() {
            protected = protected.route(route.pattern(), handlers(route));
        } else {
            public = public.route(route.pattern(), handlers(route));
        }
    }
    let protected = protected.route_layer(middleware::from_fn_with_state(
        state.clone(),
        login_required,
    ));

    let body_limit = state.settings.media.max_upload_bytes + FORM_OVERHEAD_BYTES;

    public
        .merge(protected)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_identity,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
