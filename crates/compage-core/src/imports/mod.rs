//! Import discovery for compiled Python 2 modules.
//!
//! The scanner walks each code unit's instructions, resolves the import
//! pattern to records, and descends into nested units (functions, classes)
//! in constant-table order.

mod extract;
mod record;
mod scan;
mod source;

pub use extract::extract_imports;
pub use record::{ImportRecord, ImportStyle};
pub use scan::{scan_unit, ImportScanner, ScanResult, UnitFailure};
pub use source::SourceCache;
