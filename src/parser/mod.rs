pub mod extract;
pub mod group;

pub use extract::GroupKey;
pub use group::{group_pages, scan_pages, GroupTable, PageSource, ScanReport};
