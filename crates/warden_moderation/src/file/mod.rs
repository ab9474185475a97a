//! File-backed stores. Each store is one pretty-printed JSON array.

pub mod appeal_storage;
pub mod json_file;
pub mod log_storage;

pub use appeal_storage::FileAppealStorage;
pub use json_file::JsonArrayFile;
pub use log_storage::FileLogStorage;
