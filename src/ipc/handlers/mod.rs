pub mod backup;
pub mod classes;
pub mod core;
pub mod export;
pub mod records;
pub mod refresh;
pub mod scans;
pub mod summary;
