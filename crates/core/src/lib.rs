pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{SegmentationError, SegmentationResult, StoreError};
pub use types::{Contact, ContactId, ContactStatus};
