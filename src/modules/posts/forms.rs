//! Validation of submitted post, book and comment forms.
//!
//! A form binds raw [`FormData`], optionally against an existing record, and
//! yields either a draft or a [`ValidationError`] with per-field messages.
//! The author is never read from the submission.

use std::collections::BTreeMap;

use image::ImageFormat;
use thebook_db::{Book, BookId, GroupId, NewBook, NewComment, NewPost, Post, PostId, Repository, UserId};
use thiserror::Error;

use crate::utils::{FormData, Upload};

pub const TEXT_MAX_LENGTH: usize = 500;
pub const TITLE_MAX_LENGTH: usize = 200;
pub const DESCRIPTION_MAX_LENGTH: usize = 500;

const IMAGE_EXTENSIONS: &[&str] = &["bmp", "gif", "jpeg", "jpg", "png", "webp"];

const REQUIRED: &str = "This field is required.";
const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";
const EMPTY_FILE: &str = "The submitted file is empty.";
const NOT_AN_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
const FILE_AND_CLEAR: &str = "Please either submit a file or check the clear checkbox, not both.";

/// Field-level messages for a rejected submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("form submission rejected for {} field(s)", .fields.len())]
pub struct ValidationError {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationError> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// Field values and errors as shown when a form is rendered.
#[derive(Debug, Clone, Default)]
pub struct BoundForm {
    values: BTreeMap<String, String>,
    errors: ValidationError,
}

impl BoundForm {
    pub fn value(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn errors(&self, name: &str) -> &[String] {
        self.errors.field(name)
    }

    pub fn has_errors(&self, name: &str) -> bool {
        !self.errors.field(name).is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn set(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_string(), value.into());
    }
}

/// What a submission asks for on an optional image field.
#[derive(Debug, Clone, Default)]
pub enum ImageInput {
    #[default]
    Unchanged,
    Clear,
    Replace(Upload),
}

#[derive(Debug, Clone)]
pub struct PostDraft {
    pub text: String,
    pub group: Option<GroupId>,
    pub book: Option<BookId>,
    pub image: ImageInput,
}

impl PostDraft {
    pub fn into_new_post(self, author: UserId, image: Option<String>) -> NewPost {
        NewPost {
            text: self.text,
            author,
            group: self.group,
            book: self.book,
            image,
        }
    }

    /// Overwrite the editable fields of `post`; author and date are untouched.
    pub fn apply_to(self, post: &mut Post, image: Option<String>) {
        post.text = self.text;
        post.group = self.group;
        post.book = self.book;
        post.image = image;
    }
}

#[derive(Debug, Clone)]
pub struct BookDraft {
    pub title: String,
    pub author_book: String,
    pub description: String,
    pub image: ImageInput,
}

impl BookDraft {
    pub fn into_new_book(self, created_by: UserId, image: Option<String>) -> NewBook {
        NewBook {
            title: self.title,
            author_book: self.author_book,
            description: self.description,
            image,
            created_by: Some(created_by),
        }
    }

    pub fn apply_to(self, book: &mut Book, image: Option<String>) {
        book.title = self.title;
        book.author_book = self.author_book;
        book.description = self.description;
        book.image = image;
    }
}

#[derive(Debug, Clone)]
pub struct CommentDraft {
    pub text: String,
}

impl CommentDraft {
    pub fn into_new_comment(self, author: UserId, post: PostId) -> NewComment {
        NewComment {
            text: self.text,
            author,
            post,
        }
    }
}

fn char_count(value: &str) -> usize {
    value.chars().count()
}

/// Trimmed text, falling back to `prior` when the field was not submitted.
fn text_value(data: &FormData, name: &str, prior: Option<&str>) -> String {
    match data.field(name) {
        Some(raw) => raw.trim().to_string(),
        None => prior.unwrap_or_default().to_string(),
    }
}

fn check_text(errors: &mut ValidationError, name: &str, value: &str, max: usize, required: bool) {
    if value.is_empty() {
        if required {
            errors.add(name, REQUIRED);
        }
        return;
    }
    let length = char_count(value);
    if length > max {
        errors.add(
            name,
            format!(
                "Ensure this value has at most {} characters (it has {}).",
                max, length
            ),
        );
    }
}

/// Optional foreign-key choice; `exists` confirms the id refers to a record.
fn choice_value(
    errors: &mut ValidationError,
    data: &FormData,
    name: &str,
    prior: Option<i64>,
    exists: impl Fn(i64) -> bool,
) -> Option<i64> {
    let Some(raw) = data.field(name) else {
        return prior;
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<i64>() {
        Ok(id) if exists(id) => Some(id),
        _ => {
            errors.add(name, INVALID_CHOICE);
            None
        }
    }
}

fn image_value(
    errors: &mut ValidationError,
    data: &FormData,
    name: &str,
    max_upload_bytes: usize,
) -> ImageInput {
    let clear = data.flag(&format!("{}-clear", name));
    let Some(upload) = data.file(name) else {
        return if clear {
            ImageInput::Clear
        } else {
            ImageInput::Unchanged
        };
    };

    if clear {
        errors.add(name, FILE_AND_CLEAR);
        return ImageInput::Unchanged;
    }
    if upload.bytes.is_empty() {
        errors.add(name, EMPTY_FILE);
        return ImageInput::Unchanged;
    }

    let extension = upload.extension().unwrap_or_default();
    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        errors.add(
            name,
            format!(
                "File extension “{}” is not allowed. Allowed extensions are: {}.",
                extension,
                IMAGE_EXTENSIONS.join(", ")
            ),
        );
        return ImageInput::Unchanged;
    }
    if upload
        .content_type
        .as_deref()
        .is_some_and(|ct| !ct.starts_with("image/"))
    {
        errors.add(name, NOT_AN_IMAGE);
        return ImageInput::Unchanged;
    }
    if upload.bytes.len() > max_upload_bytes {
        errors.add(
            name,
            format!(
                "Ensure this file is no larger than {} bytes (it has {}).",
                max_upload_bytes,
                upload.bytes.len()
            ),
        );
        return ImageInput::Unchanged;
    }
    if !is_supported_image(&upload.bytes) {
        errors.add(name, NOT_AN_IMAGE);
        return ImageInput::Unchanged;
    }

    ImageInput::Replace(upload.clone())
}

/// Formats accepted by sniffing the leading bytes; the name and declared type are not trusted.
fn is_supported_image(bytes: &[u8]) -> bool {
    matches!(
        image::guess_format(bytes),
        Ok(ImageFormat::Png
            | ImageFormat::Jpeg
            | ImageFormat::Gif
            | ImageFormat::WebP
            | ImageFormat::Bmp)
    )
}

/// Post form: `text`, `group`, `book`, `image`.
pub struct PostForm<'a> {
    data: FormData,
    instance: Option<&'a Post>,
}

impl<'a> PostForm<'a> {
    pub fn new(data: FormData) -> Self {
        Self {
            data,
            instance: None,
        }
    }

    /// Bind against an existing post; omitted fields keep its values.
    pub fn for_post(data: FormData, post: &'a Post) -> Self {
        Self {
            data,
            instance: Some(post),
        }
    }

    /// Values for a form that has not been submitted.
    pub fn initial(post: Option<&Post>) -> BoundForm {
        let mut form = BoundForm::default();
        if let Some(post) = post {
            form.set("text", post.text.clone());
            form.set("group", post.group.map(|id| id.to_string()).unwrap_or_default());
            form.set("book", post.book.map(|id| id.to_string()).unwrap_or_default());
        }
        form
    }

    pub fn validate(
        &self,
        store: &dyn Repository,
        max_upload_bytes: usize,
    ) -> Result<PostDraft, ValidationError> {
        let mut errors = ValidationError::default();
        let prior = self.instance;

        let text = text_value(&self.data, "text", prior.map(|p| p.text.as_str()));
        check_text(&mut errors, "text", &text, TEXT_MAX_LENGTH, true);

        let group = choice_value(
            &mut errors,
            &self.data,
            "group",
            prior.and_then(|p| p.group),
            |id| store.group(id).is_ok(),
        );
        let book = choice_value(
            &mut errors,
            &self.data,
            "book",
            prior.and_then(|p| p.book),
            |id| store.book(id).is_ok(),
        );
        let image = image_value(&mut errors, &self.data, "image", max_upload_bytes);

        errors.into_result(PostDraft {
            text,
            group,
            book,
            image,
        })
    }

    /// Submitted values with `errors` attached, for re-rendering.
    pub fn bound(&self, errors: ValidationError) -> BoundForm {
        let mut form = Self::initial(self.instance);
        for name in ["text", "group", "book"] {
            if let Some(value) = self.data.field(name) {
                form.set(name, value);
            }
        }
        form.errors = errors;
        form
    }
}

/// Book form: `title`, `author_book`, `description`, `image_book`.
pub struct BookForm<'a> {
    data: FormData,
    instance: Option<&'a Book>,
}

impl<'a> BookForm<'a> {
    pub fn new(data: FormData) -> Self {
        Self {
            data,
            instance: None,
        }
    }

    pub fn for_book(data: FormData, book: &'a Book) -> Self {
        Self {
            data,
            instance: Some(book),
        }
    }

    pub fn initial(book: Option<&Book>) -> BoundForm {
        let mut form = BoundForm::default();
        if let Some(book) = book {
            form.set("title", book.title.clone());
            form.set("author_book", book.author_book.clone());
            form.set("description", book.description.clone());
        }
        form
    }

    pub fn validate(&self, max_upload_bytes: usize) -> Result<BookDraft, ValidationError> {
        let mut errors = ValidationError::default();
        let prior = self.instance;

        let title = text_value(&self.data, "title", prior.map(|b| b.title.as_str()));
        check_text(&mut errors, "title", &title, TITLE_MAX_LENGTH, true);

        let author_book =
            text_value(&self.data, "author_book", prior.map(|b| b.author_book.as_str()));
        check_text(&mut errors, "author_book", &author_book, TITLE_MAX_LENGTH, true);

        let description =
            text_value(&self.data, "description", prior.map(|b| b.description.as_str()));
        check_text(
            &mut errors,
            "description",
            &description,
            DESCRIPTION_MAX_LENGTH,
            true,
        );

        let image = image_value(&mut errors, &self.data, "image_book", max_upload_bytes);

        errors.into_result(BookDraft {
            title,
            author_book,
            description,
            image,
        })
    }

    pub fn bound(&self, errors: ValidationError) -> BoundForm {
        let mut form = Self::initial(self.instance);
        for name in ["title", "author_book", "description"] {
            if let Some(value) = self.data.field(name) {
                form.set(name, value);
            }
        }
        form.errors = errors;
        form
    }
}

/// Comment form: `text`.
pub struct CommentForm {
    data: FormData,
}

impl CommentForm {
    pub fn new(data: FormData) -> Self {
        Self { data }
    }

    pub fn validate(&self) -> Result<CommentDraft, ValidationError> {
        let mut errors = ValidationError::default();
        let text = text_value(&self.data, "text", None);
        check_text(&mut errors, "text", &text, TEXT_MAX_LENGTH, true);
        errors.into_result(CommentDraft { text })
    }

    pub fn bound(&self, errors: ValidationError) -> BoundForm {
        let mut form = BoundForm::default();
        if let Some(text) = self.data.field("text") {
            form.set("text", text);
        }
        form.errors = errors;
        form
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thebook_db::{MemoryStore, NewGroup, NewUser};

    const MAX_UPLOAD: usize = 1024;

    fn store_with_group() -> (MemoryStore, GroupId, UserId) {
        let store = MemoryStore::new();
        let user = store.create_user(NewUser::named("writer")).unwrap();
        let group = store
            .create_group(NewGroup {
                title: "Poetry".to_string(),
                slug: "poetry".to_string(),
                description: String::new(),
            })
            .unwrap();
        (store, group.id, user.id)
    }

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    fn png(bytes: &[u8]) -> Upload {
        Upload::new("pic.png", Some("image/png"), bytes.to_vec())
    }

    fn png_bytes() -> Vec<u8> {
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.extend_from_slice(b"\0\0\0\rIHDR");
        bytes
    }

    #[test]
    fn post_form_accepts_text_and_group() {
        let (store, group, _) = store_with_group();
        let data = FormData::new()
            .with_field("text", "  A new post  ")
            .with_field("group", group.to_string())
            .with_field("book", "");

        let draft = PostForm::new(data).validate(&store, MAX_UPLOAD).unwrap();
        assert_eq!(draft.text, "A new post");
        assert_eq!(draft.group, Some(group));
        assert_eq!(draft.book, None);
        assert!(matches!(draft.image, ImageInput::Unchanged));
    }

    #[test]
    fn post_form_requires_text() {
        let (store, _, _) = store_with_group();
        let err = PostForm::new(FormData::new().with_field("text", "   "))
            .validate(&store, MAX_UPLOAD)
            .unwrap_err();
        assert_eq!(err.field("text"), [REQUIRED.to_string()]);
    }

    #[test]
    fn post_form_limits_text_length() {
        let (store, _, _) = store_with_group();
        let long = "я".repeat(TEXT_MAX_LENGTH + 1);
        let err = PostForm::new(FormData::new().with_field("text", long))
            .validate(&store, MAX_UPLOAD)
            .unwrap_err();
        assert_eq!(
            err.field("text"),
            ["Ensure this value has at most 500 characters (it has 501).".to_string()]
        );

        let exact = "я".repeat(TEXT_MAX_LENGTH);
        assert!(PostForm::new(FormData::new().with_field("text", exact))
            .validate(&store, MAX_UPLOAD)
            .is_ok());
    }

    #[test]
    fn post_form_rejects_unknown_choices() {
        let (store, _, _) = store_with_group();
        let data = FormData::new()
            .with_field("text", "hi")
            .with_field("group", "9999")
            .with_field("book", "not-a-number");
        let err = PostForm::new(data).validate(&store, MAX_UPLOAD).unwrap_err();
        assert_eq!(err.field("group"), [INVALID_CHOICE.to_string()]);
        assert_eq!(err.field("book"), [INVALID_CHOICE.to_string()]);
        assert!(err.field("text").is_empty());
    }

    #[test]
    fn edit_mode_keeps_omitted_fields() {
        let (store, group, author) = store_with_group();
        let post = store
            .create_post(NewPost {
                text: "original".to_string(),
                author,
                group: Some(group),
                book: None,
                image: Some("posts/old.png".to_string()),
            })
            .unwrap();

        let form = PostForm::for_post(FormData::new().with_field("text", "edited"), &post);
        let draft = form.validate(&store, MAX_UPLOAD).unwrap();
        assert_eq!(draft.text, "edited");
        assert_eq!(draft.group, Some(group));
        assert!(matches!(draft.image, ImageInput::Unchanged));

        let mut edited = post.clone();
        draft.apply_to(&mut edited, post.image.clone());
        assert_eq!(edited.text, "edited");
        assert_eq!(edited.author, post.author);
        assert_eq!(edited.pub_date, post.pub_date);
        assert_eq!(edited.image.as_deref(), Some("posts/old.png"));
    }

    #[test]
    fn edit_mode_blank_group_clears_it() {
        let (store, group, author) = store_with_group();
        let post = store
            .create_post(NewPost {
                text: "original".to_string(),
                author,
                group: Some(group),
                book: None,
                image: None,
            })
            .unwrap();

        let data = FormData::new().with_field("group", "");
        let draft = PostForm::for_post(data, &post).validate(&store, MAX_UPLOAD).unwrap();
        assert_eq!(draft.text, "original");
        assert_eq!(draft.group, None);
    }

    #[test]
    fn image_rules() {
        let (store, _, _) = store_with_group();
        let check = |upload: Upload, clear: bool| {
            let mut data = FormData::new().with_field("text", "pic").with_file("image", upload);
            if clear {
                data = data.with_field("image-clear", "on");
            }
            PostForm::new(data).validate(&store, MAX_UPLOAD)
        };

        assert!(matches!(
            check(png(&png_bytes()), false).unwrap().image,
            ImageInput::Replace(_)
        ));
        assert_eq!(
            check(png(b""), false).unwrap_err().field("image"),
            [EMPTY_FILE.to_string()]
        );
        assert_eq!(
            check(png(&png_bytes()), true).unwrap_err().field("image"),
            [FILE_AND_CLEAR.to_string()]
        );
        assert_eq!(
            check(Upload::new("pic.png", Some("text/plain"), b"x".to_vec()), false)
                .unwrap_err()
                .field("image"),
            [NOT_AN_IMAGE.to_string()]
        );
        assert!(!check(Upload::new("notes.txt", None, b"x".to_vec()), false)
            .unwrap_err()
            .field("image")
            .is_empty());
        assert!(!check(png(&[0u8; MAX_UPLOAD + 1]), false)
            .unwrap_err()
            .field("image")
            .is_empty());
    }

    #[test]
    fn image_named_png_must_have_image_bytes() {
        let (store, _, _) = store_with_group();
        let script = Upload::new(
            "cat.png",
            Some("image/png"),
            b"#!/bin/sh\nrm -rf /tmp/cache\n".to_vec(),
        );
        let data = FormData::new()
            .with_field("text", "pic")
            .with_file("image", script);

        let err = PostForm::new(data).validate(&store, MAX_UPLOAD).unwrap_err();
        assert_eq!(err.field("image"), [NOT_AN_IMAGE.to_string()]);
    }

    #[test]
    fn sniffed_formats() {
        assert!(is_supported_image(&png_bytes()));
        assert!(is_supported_image(b"\xff\xd8\xff\xe0\0\x10JFIF"));
        assert!(is_supported_image(b"GIF89a\x01\0\x01\0"));
        assert!(!is_supported_image(b"%PDF-1.7"));
        assert!(!is_supported_image(b"data"));
    }

    #[test]
    fn clear_flag_without_file_clears() {
        let (store, _, _) = store_with_group();
        let data = FormData::new()
            .with_field("text", "pic")
            .with_field("image-clear", "on");
        let draft = PostForm::new(data).validate(&store, MAX_UPLOAD).unwrap();
        assert!(matches!(draft.image, ImageInput::Clear));
    }

    #[test]
    fn bound_form_echoes_submission() {
        let (store, _, _) = store_with_group();
        let form = PostForm::new(FormData::new().with_field("text", "").with_field("group", "7"));
        let errors = form.validate(&store, MAX_UPLOAD).unwrap_err();
        let bound = form.bound(errors);
        assert_eq!(bound.value("group"), "7");
        assert!(bound.has_errors("text"));
        assert!(bound.has_errors("group"));
        assert!(!bound.is_valid());
    }

    #[test]
    fn book_form_requires_all_text_fields() {
        let err = BookForm::new(FormData::new().with_field("title", "Dune"))
            .validate(MAX_UPLOAD)
            .unwrap_err();
        let fields: Vec<&str> = err.fields().collect();
        assert_eq!(fields, vec!["author_book", "description"]);
    }

    #[test]
    fn book_form_limits_title() {
        let data = FormData::new()
            .with_field("title", "t".repeat(TITLE_MAX_LENGTH + 1))
            .with_field("author_book", "Frank Herbert")
            .with_field("description", "Spice");
        let err = BookForm::new(data).validate(MAX_UPLOAD).unwrap_err();
        assert_eq!(err.fields().collect::<Vec<_>>(), vec!["title"]);
    }

    #[test]
    fn book_form_edit_keeps_prior_values() {
        let book = Book {
            id: 1,
            title: "Dune".to_string(),
            author_book: "Frank Herbert".to_string(),
            description: "Spice".to_string(),
            image: None,
            created_by: None,
        };
        let data = FormData::new().with_field("description", "Sand and spice");
        let draft = BookForm::for_book(data, &book).validate(MAX_UPLOAD).unwrap();

        let mut edited = book.clone();
        draft.apply_to(&mut edited, None);
        assert_eq!(edited.title, "Dune");
        assert_eq!(edited.description, "Sand and spice");
    }

    #[test]
    fn comment_form_rules() {
        assert_eq!(
            CommentForm::new(FormData::new().with_field("text", " nice "))
                .validate()
                .unwrap()
                .text,
            "nice"
        );
        assert!(CommentForm::new(FormData::new()).validate().is_err());
        assert!(CommentForm::new(FormData::new().with_field("text", "x".repeat(501)))
            .validate()
            .is_err());
    }
}
