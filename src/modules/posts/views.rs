//! Page handlers.
//!
//! Each handler takes the application state, the caller's [`Identity`] and its
//! already-extracted inputs, and returns an [`Outcome`]: a rendered page or a
//! redirect. HTTP plumbing lives in `routes`.

use askama::Template;
use axum::response::{Html, IntoResponse, Redirect, Response};
use thebook_authz::{can_edit_book, can_edit_post, AuthUser, Identity};
use thebook_db::{Book, BookId, Post, PostId};
use thebook_http::error::AppError;

use super::forms::{BookForm, BoundForm, CommentForm, ImageInput, PostForm};
use super::templates::*;
use super::urls;
use crate::app::AppState;
use crate::modules::auth::Viewer;
use crate::utils::{paginate, FormData, Page};

/// Result of a page handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Render(String),
    Redirect(String),
}

impl Outcome {
    fn page(template: impl Template) -> Result<Self, AppError> {
        Ok(Self::Render(template.render()?))
    }

    fn redirect(location: impl Into<String>) -> Result<Self, AppError> {
        Ok(Self::Redirect(location.into()))
    }

    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Redirect(location) => Some(location),
            Self::Render(_) => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Render(body) => Some(body),
            Self::Redirect(_) => None,
        }
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Self::Render(body) => Html(body).into_response(),
            Self::Redirect(location) => Redirect::to(&location).into_response(),
        }
    }
}

pub type PageResult = Result<Outcome, AppError>;

/// Signed-in caller; the route guard normally rejects anonymous callers first.
fn require_user(identity: &Identity) -> Result<&AuthUser, AppError> {
    identity
        .as_user()
        .ok_or_else(|| AppError::unauthorized("sign in to continue"))
}

fn post_page(state: &AppState, posts: Vec<Post>, number: usize) -> Result<Page<PostView>, AppError> {
    let store = state.store.as_ref();
    let media = state.media.as_ref();
    Ok(paginate(posts, number, state.page_size())
        .try_map(|post| PostView::build(&post, store, media))?)
}

/// Persist an upload or apply a clear; anything else keeps `current`.
async fn resolve_image(
    state: &AppState,
    input: ImageInput,
    current: Option<String>,
) -> Result<Option<String>, AppError> {
    match input {
        ImageInput::Unchanged => Ok(current),
        ImageInput::Clear => Ok(None),
        ImageInput::Replace(upload) => Ok(Some(state.media.save(&upload).await?)),
    }
}

pub fn index(state: &AppState, identity: &Identity, page: usize) -> PageResult {
    let posts = state.store.posts()?;
    Outcome::page(IndexTemplate {
        viewer: Viewer::new(identity, state),
        title: "Last changes".to_string(),
        page: post_page(state, posts, page)?,
    })
}

pub fn group_list(state: &AppState, identity: &Identity, slug: &str, page: usize) -> PageResult {
    let group = state.store.group_by_slug(slug)?;
    let posts = state.store.posts_by_group(group.id)?;
    Outcome::page(GroupListTemplate {
        viewer: Viewer::new(identity, state),
        title: format!("Posts of the group {}", group.title),
        group: GroupView::from(&group),
        page: post_page(state, posts, page)?,
    })
}

pub fn book_list(state: &AppState, identity: &Identity, book_id: BookId, page: usize) -> PageResult {
    let book = state.store.book(book_id)?;
    let posts = state.store.posts_by_book(book.id)?;
    Outcome::page(BookListTemplate {
        viewer: Viewer::new(identity, state),
        title: format!("Posts about {}", book.title),
        can_edit: can_edit_book(state.settings.books.edit_policy, identity, book.created_by),
        book: BookView::new(&book, state.media.as_ref()),
        page: post_page(state, posts, page)?,
    })
}

pub fn books(state: &AppState, identity: &Identity, page: usize) -> PageResult {
    let media = state.media.as_ref();
    let page = paginate(state.store.books()?, page, state.page_size())
        .map(|book| BookView::new(&book, media));
    Outcome::page(BooksTemplate {
        viewer: Viewer::new(identity, state),
        title: "All books".to_string(),
        page,
    })
}

pub fn profile(state: &AppState, identity: &Identity, username: &str, page: usize) -> PageResult {
    let author = state.store.user_by_username(username)?;
    let posts = state.store.posts_by_author(author.id)?;
    Outcome::page(ProfileTemplate {
        viewer: Viewer::new(identity, state),
        title: format!("Profile of {}", author.display_name()),
        author: AuthorView::from(&author),
        post_count: posts.len(),
        is_own_profile: identity.is(author.id),
        page: post_page(state, posts, page)?,
    })
}

fn render_post_detail(
    state: &AppState,
    identity: &Identity,
    post: &Post,
    comment_form: &BoundForm,
) -> PageResult {
    let store = state.store.as_ref();
    let comments = store
        .comments_for_post(post.id)?
        .iter()
        .map(|comment| CommentView::build(comment, store))
        .collect::<Result<Vec<_>, _>>()?;

    Outcome::page(PostDetailTemplate {
        viewer: Viewer::new(identity, state),
        post: PostView::build(post, store, state.media.as_ref())?,
        is_author: can_edit_post(identity, post.author),
        author_post_count: store.posts_by_author(post.author)?.len(),
        comment_form: FieldView::from_form(comment_form, "text"),
        comment_action: urls::add_comment(post.id),
        comment_count: comments.len(),
        comments,
    })
}

pub fn post_detail(state: &AppState, identity: &Identity, post_id: PostId) -> PageResult {
    let post = state.store.post(post_id)?;
    render_post_detail(state, identity, &post, &BoundForm::default())
}

fn render_post_form(
    state: &AppState,
    identity: &Identity,
    form: &BoundForm,
    post: Option<&Post>,
) -> PageResult {
    let groups = state.store.groups()?;
    let books = state.store.books()?;
    let current_group = form.value("group");
    let current_book = form.value("book");

    Outcome::page(PostFormTemplate {
        viewer: Viewer::new(identity, state),
        is_edit: post.is_some(),
        action_url: post
            .map(|p| urls::post_edit(p.id))
            .unwrap_or_else(urls::post_create),
        text: FieldView::from_form(form, "text"),
        group: FieldView::from_form(form, "group"),
        groups: ChoiceView::list(&groups, current_group, |g| g.id.to_string(), |g| g.title.clone()),
        book: FieldView::from_form(form, "book"),
        books: ChoiceView::list(&books, current_book, |b| b.id.to_string(), |b| b.title.clone()),
        image: FieldView::from_form(form, "image"),
        current_image: CurrentImage::new(
            post.and_then(|p| p.image.as_deref()),
            state.media.as_ref(),
        ),
    })
}

pub fn post_create_form(state: &AppState, identity: &Identity) -> PageResult {
    require_user(identity)?;
    render_post_form(state, identity, &PostForm::initial(None), None)
}

pub async fn post_create(state: &AppState, identity: &Identity, data: FormData) -> PageResult {
    let user = require_user(identity)?;
    let form = PostForm::new(data);
    let draft = match form.validate(state.store.as_ref(), state.settings.media.max_upload_bytes) {
        Ok(draft) => draft,
        Err(errors) => return render_post_form(state, identity, &form.bound(errors), None),
    };

    let image = resolve_image(state, draft.image.clone(), None).await?;
    let post = state.store.create_post(draft.into_new_post(user.id, image))?;
    tracing::info!(post_id = post.id, author = user.id, "post created");
    Outcome::redirect(urls::profile(&user.username))
}

/// The post, or a redirect to its page when the caller may not edit it.
fn editable_post(state: &AppState, identity: &Identity, post_id: PostId) -> Result<Result<Post, Outcome>, AppError> {
    let post = state.store.post(post_id)?;
    if can_edit_post(identity, post.author) {
        Ok(Ok(post))
    } else {
        tracing::debug!(post_id, caller = ?identity.user_id(), "post edit refused");
        Ok(Err(Outcome::Redirect(urls::post_detail(post_id))))
    }
}

pub fn post_edit_form(state: &AppState, identity: &Identity, post_id: PostId) -> PageResult {
    require_user(identity)?;
    match editable_post(state, identity, post_id)? {
        Ok(post) => render_post_form(state, identity, &PostForm::initial(Some(&post)), Some(&post)),
        Err(refused) => Ok(refused),
    }
}

pub async fn post_edit(
    state: &AppState,
    identity: &Identity,
    post_id: PostId,
    data: FormData,
) -> PageResult {
    require_user(identity)?;
    let post = match editable_post(state, identity, post_id)? {
        Ok(post) => post,
        Err(refused) => return Ok(refused),
    };

    let form = PostForm::for_post(data, &post);
    let draft = match form.validate(state.store.as_ref(), state.settings.media.max_upload_bytes) {
        Ok(draft) => draft,
        Err(errors) => return render_post_form(state, identity, &form.bound(errors), Some(&post)),
    };

    let image = resolve_image(state, draft.image.clone(), post.image.clone()).await?;
    let mut updated = post.clone();
    draft.apply_to(&mut updated, image);
    state.store.save_post(&updated)?;
    tracing::info!(post_id, "post edited");
    Outcome::redirect(urls::post_detail(post_id))
}

fn render_book_form(
    state: &AppState,
    identity: &Identity,
    form: &BoundForm,
    book: Option<&Book>,
) -> PageResult {
    Outcome::page(BookFormTemplate {
        viewer: Viewer::new(identity, state),
        is_edit: book.is_some(),
        action_url: book
            .map(|b| urls::book_edit(b.id))
            .unwrap_or_else(urls::book_create),
        title: FieldView::from_form(form, "title"),
        author_book: FieldView::from_form(form, "author_book"),
        description: FieldView::from_form(form, "description"),
        image_book: FieldView::from_form(form, "image_book"),
        current_image: CurrentImage::new(
            book.and_then(|b| b.image.as_deref()),
            state.media.as_ref(),
        ),
    })
}

pub fn book_create_form(state: &AppState, identity: &Identity) -> PageResult {
    require_user(identity)?;
    render_book_form(state, identity, &BookForm::initial(None), None)
}

pub async fn book_create(state: &AppState, identity: &Identity, data: FormData) -> PageResult {
    let user = require_user(identity)?;
    let form = BookForm::new(data);
    let draft = match form.validate(state.settings.media.max_upload_bytes) {
        Ok(draft) => draft,
        Err(errors) => return render_book_form(state, identity, &form.bound(errors), None),
    };

    let image = resolve_image(state, draft.image.clone(), None).await?;
    let book = state.store.create_book(draft.into_new_book(user.id, image))?;
    tracing::info!(book_id = book.id, created_by = user.id, "book created");
    Outcome::redirect(urls::profile(&user.username))
}

fn editable_book(state: &AppState, identity: &Identity, book_id: BookId) -> Result<Result<Book, Outcome>, AppError> {
    let book = state.store.book(book_id)?;
    if can_edit_book(state.settings.books.edit_policy, identity, book.created_by) {
        Ok(Ok(book))
    } else {
        tracing::debug!(book_id, caller = ?identity.user_id(), "book edit refused");
        Ok(Err(Outcome::Redirect(urls::book_list(book_id))))
    }
}

pub fn book_edit_form(state: &AppState, identity: &Identity, book_id: BookId) -> PageResult {
    require_user(identity)?;
    match editable_book(state, identity, book_id)? {
        Ok(book) => render_book_form(state, identity, &BookForm::initial(Some(&book)), Some(&book)),
        Err(refused) => Ok(refused),
    }
}

pub async fn book_edit(
    state: &AppState,
    identity: &Identity,
    book_id: BookId,
    data: FormData,
) -> PageResult {
    let user = require_user(identity)?;
    let book = match editable_book(state, identity, book_id)? {
        Ok(book) => book,
        Err(refused) => return Ok(refused),
    };

    let form = BookForm::for_book(data, &book);
    let draft = match form.validate(state.settings.media.max_upload_bytes) {
        Ok(draft) => draft,
        Err(errors) => return render_book_form(state, identity, &form.bound(errors), Some(&book)),
    };

    let image = resolve_image(state, draft.image.clone(), book.image.clone()).await?;
    let mut updated = book.clone();
    draft.apply_to(&mut updated, image);
    state.store.save_book(&updated)?;
    tracing::info!(book_id, editor = user.id, "book edited");
    Outcome::redirect(urls::profile(&user.username))
}

pub fn add_comment(
    state: &AppState,
    identity: &Identity,
    post_id: PostId,
    data: FormData,
) -> PageResult {
    let user = require_user(identity)?;
    let post = state.store.post(post_id)?;

    let form = CommentForm::new(data);
    match form.validate() {
        Ok(draft) => {
            let comment = state
                .store
                .create_comment(draft.into_new_comment(user.id, post.id))?;
            tracing::info!(comment_id = comment.id, post_id, author = user.id, "comment added");
            Outcome::redirect(urls::post_detail(post_id))
        }
        Err(errors) => render_post_detail(state, identity, &post, &form.bound(errors)),
    }
}
