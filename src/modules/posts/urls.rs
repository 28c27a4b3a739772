//! Named routes of the posts module and their reverse functions.

use thebook_db::{BookId, PostId};

/// Every page the posts module serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Index,
    GroupList,
    BookList,
    Profile,
    PostDetail,
    PostCreate,
    PostEdit,
    BookEdit,
    BookCreate,
    Books,
    AddComment,
}

impl Route {
    pub const ALL: [Route; 11] = [
        Route::Index,
        Route::GroupList,
        Route::BookList,
        Route::Profile,
        Route::PostDetail,
        Route::PostCreate,
        Route::PostEdit,
        Route::BookEdit,
        Route::BookCreate,
        Route::Books,
        Route::AddComment,
    ];

    /// Qualified name, e.g. `posts:post_detail`.
    pub fn name(self) -> &'static str {
        match self {
            Route::Index => "posts:index",
            Route::GroupList => "posts:group_list",
            Route::BookList => "posts:book_list",
            Route::Profile => "posts:profile",
            Route::PostDetail => "posts:post_detail",
            Route::PostCreate => "posts:post_create",
            Route::PostEdit => "posts:post_edit",
            Route::BookEdit => "posts:book_edit",
            Route::BookCreate => "posts:book_create",
            Route::Books => "posts:books",
            Route::AddComment => "posts:add_comment",
        }
    }

    /// Axum path pattern.
    pub fn pattern(self) -> &'static str {
        match self {
            Route::Index => "/",
            Route::GroupList => "/group/{slug}/",
            Route::BookList => "/books/{book_id}/",
            Route::Profile => "/profile/{username}/",
            Route::PostDetail => "/posts/{post_id}/",
            Route::PostCreate => "/create/",
            Route::PostEdit => "/posts/{post_id}/edit/",
            Route::BookEdit => "/books/{book_id}/edit/",
            Route::BookCreate => "/create_book/",
            Route::Books => "/books/",
            Route::AddComment => "/posts/{post_id}/comment/",
        }
    }

    /// Pages served only to a signed-in caller.
    pub fn requires_login(self) -> bool {
        matches!(
            self,
            Route::PostCreate
                | Route::PostEdit
                | Route::BookEdit
                | Route::BookCreate
                | Route::AddComment
        )
    }
}

pub fn index() -> String {
    "/".to_string()
}

pub fn group_list(slug: &str) -> String {
    format!("/group/{}/", slug)
}

pub fn book_list(book_id: BookId) -> String {
    format!("/books/{}/", book_id)
}

pub fn profile(username: &str) -> String {
    format!("/profile/{}/", username)
}

pub fn post_detail(post_id: PostId) -> String {
    format!("/posts/{}/", post_id)
}

pub fn post_create() -> String {
    "/create/".to_string()
}

pub fn post_edit(post_id: PostId) -> String {
    format!("/posts/{}/edit/", post_id)
}

pub fn book_edit(book_id: BookId) -> String {
    format!("/books/{}/edit/", book_id)
}

pub fn book_create() -> String {
    "/create_book/".to_string()
}

pub fn books() -> String {
    "/books/".to_string()
}

pub fn add_comment(post_id: PostId) -> String {
    format!("/posts/{}/comment/", post_id)
}
