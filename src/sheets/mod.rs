//! Spreadsheet intake: fetching form-submission rows and spotting new ones.

pub mod row;
pub mod source;
pub mod tracker;

pub use row::SheetRow;
pub use source::{HttpSheetSource, SheetSource};
pub use tracker::RowTracker;
