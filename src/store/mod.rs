//! Store adapters
//!
//! The source side is polled and drained, the destination side receives
//! verified copies. Each backend implements one or both traits.

pub mod error;
pub mod ftp;
pub mod local;
pub mod memory;
pub mod s3;
pub mod traits;
pub mod webdav;

pub use error::StoreError;
pub use ftp::FtpStore;
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use s3::S3Store;
pub use traits::{DestinationStore, SourceEntry, SourceStore};
pub use webdav::WebDavStore;
