pub mod models;
mod state_file;

pub use models::{FileMatch, PersistentState, ScanRecord, Statistics};
pub use state_file::ScanStore;
