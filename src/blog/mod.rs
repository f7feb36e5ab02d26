pub mod cache;
pub mod detail;
pub mod error;
pub mod format;
pub mod handlers;
pub mod listing;
pub mod projection;
pub mod richtext;
pub mod types;

pub use detail::DetailController;
pub use error::BlogError;
pub use listing::{ListingController, ListingState};
pub use types::{
    BlogConfig, Post, PostLink, PostPage, PostPagination, PostSummary, Resolution,
};
