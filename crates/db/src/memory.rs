//! In-process record store.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use time::OffsetDateTime;

use crate::error::{StoreError, StoreResult};
use crate::models::*;
use crate::repository::Repository;

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    groups: BTreeMap<GroupId, Group>,
    books: BTreeMap<BookId, Book>,
    posts: BTreeMap<PostId, Post>,
    comments: BTreeMap<CommentId, Comment>,
    last_id: i64,
}

impl Tables {
    /// Ids are shared across tables and strictly increasing, so a larger id is
    /// always a later insert.
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn ensure_user(&self, entity: &'static str, id: UserId) -> StoreResult<()> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::invalid_reference(entity, "user", id))
        }
    }

    fn ensure_group(&self, id: Option<GroupId>) -> StoreResult<()> {
        match id {
            Some(id) if !self.groups.contains_key(&id) => {
                Err(StoreError::invalid_reference("post", "group", id))
            }
            _ => Ok(()),
        }
    }

    fn ensure_book(&self, id: Option<BookId>) -> StoreResult<()> {
        match id {
            Some(id) if !self.books.contains_key(&id) => {
                Err(StoreError::invalid_reference("post", "book", id))
            }
            _ => Ok(()),
        }
    }

    fn posts_where(&self, keep: impl Fn(&Post) -> bool) -> Vec<Post> {
        let mut posts: Vec<Post> = self.posts.values().filter(|p| keep(p)).cloned().collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        posts
    }

    fn remove_post(&mut self, id: PostId) {
        if self.posts.remove(&id).is_some() {
            for comment in self.comments.values_mut() {
                if comment.post == Some(id) {
                    comment.post = None;
                }
            }
        }
    }
}

/// Record store held entirely in memory behind a single lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

impl Repository for MemoryStore {
    fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut tables = self.write()?;
        if tables.users.values().any(|u| u.username == new.username) {
            return Err(StoreError::Conflict {
                entity: "user",
                field: "username",
                value: new.username,
            });
        }
        if new.username.is_empty() || new.username.contains('/') {
            return Err(StoreError::Invalid {
                entity: "user",
                message: format!("username '{}' is not usable in URLs", new.username),
            });
        }

        let user = User {
            id: tables.next_id(),
            username: new.username,
            first_name: new.first_name,
            last_name: new.last_name,
            date_joined: OffsetDateTime::now_utc(),
        };
        tables.users.insert(user.id, user.clone());
        tracing::debug!(user_id = user.id, username = %user.username, "user created");
        Ok(user)
    }

    fn user(&self, id: UserId) -> StoreResult<User> {
        self.read()?
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    fn user_by_username(&self, username: &str) -> StoreResult<User> {
        self.read()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", username))
    }

    fn delete_user(&self, id: UserId) -> StoreResult<()> {
        let mut tables = self.write()?;
        if tables.users.remove(&id).is_none() {
            return Err(StoreError::not_found("user", id));
        }

        let authored: Vec<PostId> = tables
            .posts
            .values()
            .filter(|p| p.author == id)
            .map(|p| p.id)
            .collect();
        for post in authored {
            tables.remove_post(post);
        }
        tables.comments.retain(|_, c| c.author != id);
        for book in tables.books.values_mut() {
            if book.created_by == Some(id) {
                book.created_by = None;
            }
        }
        Ok(())
    }

    fn create_group(&self, new: NewGroup) -> StoreResult<Group> {
        if !is_valid_slug(&new.slug) {
            return Err(StoreError::Invalid {
                entity: "group",
                message: format!("slug '{}' may only contain letters, digits, '-' and '_'", new.slug),
            });
        }

        let mut tables = self.write()?;
        if tables.groups.values().any(|g| g.slug == new.slug) {
            return Err(StoreError::Conflict {
                entity: "group",
                field: "slug",
                value: new.slug,
            });
        }

        let group = Group {
            id: tables.next_id(),
            title: new.title,
            slug: new.slug,
            description: new.description,
        };
        tables.groups.insert(group.id, group.clone());
        Ok(group)
    }

    fn group(&self, id: GroupId) -> StoreResult<Group> {
        self.read()?
            .groups
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("group", id))
    }

    fn group_by_slug(&self, slug: &str) -> StoreResult<Group> {
        self.read()?
            .groups
            .values()
            .find(|g| g.slug == slug)
            .cloned()
            .ok_or_else(|| StoreError::not_found("group", slug))
    }

    fn groups(&self) -> StoreResult<Vec<Group>> {
        Ok(self.read()?.groups.values().cloned().collect())
    }

    fn delete_group(&self, id: GroupId) -> StoreResult<()> {
        let mut tables = self.write()?;
        if tables.groups.remove(&id).is_none() {
            return Err(StoreError::not_found("group", id));
        }
        for post in tables.posts.values_mut() {
            if post.group == Some(id) {
                post.group = None;
            }
        }
        Ok(())
    }

    fn create_book(&self, new: NewBook) -> StoreResult<Book> {
        let mut tables = self.write()?;
        if let Some(creator) = new.created_by {
            tables.ensure_user("book", creator)?;
        }

        let book = Book {
            id: tables.next_id(),
            title: new.title,
            author_book: new.author_book,
            description: new.description,
            image: new.image,
            created_by: new.created_by,
        };
        tables.books.insert(book.id, book.clone());
        Ok(book)
    }

    fn book(&self, id: BookId) -> StoreResult<Book> {
        self.read()?
            .books
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("book", id))
    }

    fn books(&self) -> StoreResult<Vec<Book>> {
        Ok(self.read()?.books.values().cloned().collect())
    }

    fn save_book(&self, book: &Book) -> StoreResult<Book> {
        let mut tables = self.write()?;
        let stored = tables
            .books
            .get_mut(&book.id)
            .ok_or_else(|| StoreError::not_found("book", book.id))?;

        stored.title = book.title.clone();
        stored.author_book = book.author_book.clone();
        stored.description = book.description.clone();
        stored.image = book.image.clone();
        Ok(stored.clone())
    }

    fn delete_book(&self, id: BookId) -> StoreResult<()> {
        let mut tables = self.write()?;
        if tables.books.remove(&id).is_none() {
            return Err(StoreError::not_found("book", id));
        }
        for post in tables.posts.values_mut() {
            if post.book == Some(id) {
                post.book = None;
            }
        }
        Ok(())
    }

    fn create_post(&self, new: NewPost) -> StoreResult<Post> {
        let mut tables = self.write()?;
        tables.ensure_user("post", new.author)?;
        tables.ensure_group(new.group)?;
        tables.ensure_book(new.book)?;

        let post = Post {
            id: tables.next_id(),
            text: new.text,
            pub_date: OffsetDateTime::now_utc(),
            author: new.author,
            group: new.group,
            book: new.book,
            image: new.image,
        };
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    fn post(&self, id: PostId) -> StoreResult<Post> {
        self.read()?
            .posts
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("post", id))
    }

    fn posts(&self) -> StoreResult<Vec<Post>> {
        Ok(self.read()?.posts_where(|_| true))
    }

    fn posts_by_group(&self, group: GroupId) -> StoreResult<Vec<Post>> {
        Ok(self.read()?.posts_where(|p| p.group == Some(group)))
    }

    fn posts_by_book(&self, book: BookId) -> StoreResult<Vec<Post>> {
        Ok(self.read()?.posts_where(|p| p.book == Some(book)))
    }

    fn posts_by_author(&self, author: UserId) -> StoreResult<Vec<Post>> {
        Ok(self.read()?.posts_where(|p| p.author == author))
    }

    fn save_post(&self, post: &Post) -> StoreResult<Post> {
        let mut tables = self.write()?;
        tables.ensure_group(post.group)?;
        tables.ensure_book(post.book)?;
        let stored = tables
            .posts
            .get_mut(&post.id)
            .ok_or_else(|| StoreError::not_found("post", post.id))?;

        stored.text = post.text.clone();
        stored.group = post.group;
        stored.book = post.book;
        stored.image = post.image.clone();
        Ok(stored.clone())
    }

    fn delete_post(&self, id: PostId) -> StoreResult<()> {
        let mut tables = self.write()?;
        if !tables.posts.contains_key(&id) {
            return Err(StoreError::not_found("post", id));
        }
        tables.remove_post(id);
        Ok(())
    }

    fn create_comment(&self, new: NewComment) -> StoreResult<Comment> {
        let mut tables = self.write()?;
        tables.ensure_user("comment", new.author)?;
        if !tables.posts.contains_key(&new.post) {
            return Err(StoreError::invalid_reference("comment", "post", new.post));
        }

        let comment = Comment {
            id: tables.next_id(),
            text: new.text,
            created: OffsetDateTime::now_utc(),
            author: new.author,
            post: Some(new.post),
        };
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    fn comments_for_post(&self, post: PostId) -> StoreResult<Vec<Comment>> {
        let tables = self.read()?;
        let mut comments: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| c.post == Some(post))
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));
        Ok(comments)
    }

    fn comment_count(&self, post: PostId) -> StoreResult<usize> {
        Ok(self
            .read()?
            .comments
            .values()
            .filter(|c| c.post == Some(post))
            .count())
    }
}
