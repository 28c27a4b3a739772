use crate::error::StoreResult;
use crate::models::*;

/// Query and mutation surface of the record store.
///
/// List methods return records in their default ordering: posts newest `pub_date`
/// first, comments newest `created` first, groups and books by ascending id.
/// Every call is atomic with respect to every other call on the same store.
pub trait Repository: Send + Sync {
    fn create_user(&self, new: NewUser) -> StoreResult<User>;
    fn user(&self, id: UserId) -> StoreResult<User>;
    fn user_by_username(&self, username: &str) -> StoreResult<User>;
    /// Deletes the user, their posts and comments; nulls `created_by` on their books.
    fn delete_user(&self, id: UserId) -> StoreResult<()>;

    fn create_group(&self, new: NewGroup) -> StoreResult<Group>;
    fn group(&self, id: GroupId) -> StoreResult<Group>;
    fn group_by_slug(&self, slug: &str) -> StoreResult<Group>;
    fn groups(&self) -> StoreResult<Vec<Group>>;
    /// Deletes the group; posts filed under it survive with no group.
    fn delete_group(&self, id: GroupId) -> StoreResult<()>;

    fn create_book(&self, new: NewBook) -> StoreResult<Book>;
    fn book(&self, id: BookId) -> StoreResult<Book>;
    fn books(&self) -> StoreResult<Vec<Book>>;
    /// Replaces the stored book's editable fields with those of `book`.
    fn save_book(&self, book: &Book) -> StoreResult<Book>;
    /// Deletes the book; posts about it survive with no book.
    fn delete_book(&self, id: BookId) -> StoreResult<()>;

    fn create_post(&self, new: NewPost) -> StoreResult<Post>;
    fn post(&self, id: PostId) -> StoreResult<Post>;
    fn posts(&self) -> StoreResult<Vec<Post>>;
    fn posts_by_group(&self, group: GroupId) -> StoreResult<Vec<Post>>;
    fn posts_by_book(&self, book: BookId) -> StoreResult<Vec<Post>>;
    fn posts_by_author(&self, author: UserId) -> StoreResult<Vec<Post>>;
    /// Replaces text, group, book and image. `pub_date` and `author` never change.
    fn save_post(&self, post: &Post) -> StoreResult<Post>;
    /// Deletes the post; its comments survive with no post.
    fn delete_post(&self, id: PostId) -> StoreResult<()>;

    fn create_comment(&self, new: NewComment) -> StoreResult<Comment>;
    fn comments_for_post(&self, post: PostId) -> StoreResult<Vec<Comment>>;
    fn comment_count(&self, post: PostId) -> StoreResult<usize>;
}
