//! Request plumbing shared by the page modules.

pub mod form_data;
pub mod media;
pub mod pagination;

pub use form_data::{FormData, Upload};
pub use media::{LocalMediaStorage, MediaStorage};
pub use pagination::{paginate, Page, PageQuery};
