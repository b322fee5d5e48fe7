//! Feed scanning: discovery of new events and hand-off to delivery.
//!
//! - [`cursor`]: the committed stop point
//! - [`FeedScanner`]: paging, filtering and the scheduling loop

pub mod cursor;
#[allow(clippy::module_inception)]
mod scanner;


pub use cursor::ScanCursor;
pub use scanner::{FeedScanner, ScanConfig, ScanError, ScanReport};
