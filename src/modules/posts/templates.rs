//! Page templates and the view models they render.
//!
//! View models carry display-ready values (formatted dates, resolved URLs, flags)
//! so the templates never reach back into the store.

use askama::Template;
use thebook_db::{Book, Comment, Group, Post, Repository, StoreError, User};
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};

use super::forms::BoundForm;
use super::urls;
use crate::modules::auth::Viewer;
use crate::utils::{MediaStorage, Page};

const DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[day].[month].[year] [hour]:[minute]");

fn format_date(at: OffsetDateTime) -> String {
    at.format(DATE_FORMAT).unwrap_or_default()
}

/// Optional relation lookup; a reference to a row that has since gone is shown as absent.
fn optional<T>(found: Result<T, StoreError>) -> Result<Option<T>, StoreError> {
    match found {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

#[derive(Debug, Clone)]
pub struct AuthorView {
    pub username: String,
    pub display_name: String,
    pub url: String,
}

impl From<&User> for AuthorView {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            display_name: user.display_name(),
            url: urls::profile(&user.username),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupView {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub url: String,
}

impl From<&Group> for GroupView {
    fn from(group: &Group) -> Self {
        Self {
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
            url: urls::group_list(&group.slug),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookView {
    pub id: i64,
    pub title: String,
    pub author_book: String,
    pub description: String,
    pub url: String,
    pub edit_url: String,
    pub has_image: bool,
    pub image_url: String,
}

impl BookView {
    pub fn new(book: &Book, media: &dyn MediaStorage) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            author_book: book.author_book.clone(),
            description: book.description.clone(),
            url: urls::book_list(book.id),
            edit_url: urls::book_edit(book.id),
            has_image: book.image.is_some(),
            image_url: book.image.as_deref().map(|p| media.url(p)).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostView {
    pub id: i64,
    pub text: String,
    pub pub_date: String,
    pub author: AuthorView,
    pub url: String,
    pub edit_url: String,
    pub has_group: bool,
    pub group_title: String,
    pub group_url: String,
    pub has_book: bool,
    pub book_title: String,
    pub book_url: String,
    pub has_image: bool,
    pub image_url: String,
}

impl PostView {
    /// Resolve author, group and book for display.
    pub fn build(
        post: &Post,
        store: &dyn Repository,
        media: &dyn MediaStorage,
    ) -> Result<Self, StoreError> {
        let author = store.user(post.author)?;
        let group = match post.group {
            Some(id) => optional(store.group(id))?,
            None => None,
        };
        let book = match post.book {
            Some(id) => optional(store.book(id))?,
            None => None,
        };

        Ok(Self {
            id: post.id,
            text: post.text.clone(),
            pub_date: format_date(post.pub_date),
            author: AuthorView::from(&author),
            url: urls::post_detail(post.id),
            edit_url: urls::post_edit(post.id),
            has_group: group.is_some(),
            group_title: group.as_ref().map(|g| g.title.clone()).unwrap_or_default(),
            group_url: group.as_ref().map(|g| urls::group_list(&g.slug)).unwrap_or_default(),
            has_book: book.is_some(),
            book_title: book.as_ref().map(|b| b.title.clone()).unwrap_or_default(),
            book_url: book.as_ref().map(|b| urls::book_list(b.id)).unwrap_or_default(),
            has_image: post.image.is_some(),
            image_url: post.image.as_deref().map(|p| media.url(p)).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommentView {
    pub text: String,
    pub created: String,
    pub author: AuthorView,
}

impl CommentView {
    pub fn build(comment: &Comment, store: &dyn Repository) -> Result<Self, StoreError> {
        let author = store.user(comment.author)?;
        Ok(Self {
            text: comment.text.clone(),
            created: format_date(comment.created),
            author: AuthorView::from(&author),
        })
    }
}

/// One form input: the value to show and its error messages.
#[derive(Debug, Clone, Default)]
pub struct FieldView {
    pub value: String,
    pub errors: Vec<String>,
    pub has_errors: bool,
}

impl FieldView {
    pub fn from_form(form: &BoundForm, name: &str) -> Self {
        let errors = form.errors(name).to_vec();
        Self {
            value: form.value(name).to_string(),
            has_errors: !errors.is_empty(),
            errors,
        }
    }
}

/// `<option>` of a select box.
#[derive(Debug, Clone)]
pub struct ChoiceView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl ChoiceView {
    pub fn list<T>(
        items: &[T],
        current: &str,
        value: impl Fn(&T) -> String,
        label: impl Fn(&T) -> String,
    ) -> Vec<Self> {
        items
            .iter()
            .map(|item| {
                let value = value(item);
                Self {
                    selected: value == current,
                    label: label(item),
                    value,
                }
            })
            .collect()
    }
}

/// Stored image shown next to its upload input on edit forms.
#[derive(Debug, Clone, Default)]
pub struct CurrentImage {
    pub has_image: bool,
    pub path: String,
    pub url: String,
}

impl CurrentImage {
    pub fn new(path: Option<&str>, media: &dyn MediaStorage) -> Self {
        match path {
            Some(path) => Self {
                has_image: true,
                path: path.to_string(),
                url: media.url(path),
            },
            None => Self::default(),
        }
    }
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate {
    pub viewer: Viewer,
    pub title: String,
    pub page: Page<PostView>,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupListTemplate {
    pub viewer: Viewer,
    pub title: String,
    pub group: GroupView,
    pub page: Page<PostView>,
}

#[derive(Template)]
#[template(path = "posts/book_list.html")]
pub struct BookListTemplate {
    pub viewer: Viewer,
    pub title: String,
    pub book: BookView,
    pub can_edit: bool,
    pub page: Page<PostView>,
}

#[derive(Template)]
#[template(path = "posts/books.html")]
pub struct BooksTemplate {
    pub viewer: Viewer,
    pub title: String,
    pub page: Page<BookView>,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate {
    pub viewer: Viewer,
    pub title: String,
    pub author: AuthorView,
    pub post_count: usize,
    pub is_own_profile: bool,
    pub page: Page<PostView>,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub viewer: Viewer,
    pub post: PostView,
    pub is_author: bool,
    pub author_post_count: usize,
    pub comment_form: FieldView,
    pub comment_action: String,
    pub comment_count: usize,
    pub comments: Vec<CommentView>,
}

#[derive(Template)]
#[template(path = "posts/post_create.html")]
pub struct PostFormTemplate {
    pub viewer: Viewer,
    pub is_edit: bool,
    pub action_url: String,
    pub text: FieldView,
    pub group: FieldView,
    pub groups: Vec<ChoiceView>,
    pub book: FieldView,
    pub books: Vec<ChoiceView>,
    pub image: FieldView,
    pub current_image: CurrentImage,
}

#[derive(Template)]
#[template(path = "posts/book_create.html")]
pub struct BookFormTemplate {
    pub viewer: Viewer,
    pub is_edit: bool,
    pub action_url: String,
    pub title: FieldView,
    pub author_book: FieldView,
    pub description: FieldView,
    pub image_book: FieldView,
    pub current_image: CurrentImage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn dates_render_day_first() {
        assert_eq!(format_date(datetime!(2024-03-09 07:05 UTC)), "09.03.2024 07:05");
    }

    #[test]
    fn choices_mark_current_value() {
        let ids = [1i64, 2, 3];
        let choices = ChoiceView::list(&ids, "2", |id| id.to_string(), |id| format!("#{}", id));
        let selected: Vec<_> = choices.iter().filter(|c| c.selected).map(|c| c.label.as_str()).collect();
        assert_eq!(selected, vec!["#2"]);
    }
}
