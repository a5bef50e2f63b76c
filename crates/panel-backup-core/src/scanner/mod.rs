mod walk;

pub use walk::{join_path, InstanceScanner, ScanSettings};
