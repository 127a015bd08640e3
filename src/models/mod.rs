pub mod area;
pub mod backfill;
pub mod codes;
pub mod data_point;
pub mod documents;

pub use area::AreaCode;
pub use backfill::{BackfillProgress, BackfillStatus, BackfillSummary, CoverageGap, TimeRange};
pub use data_point::{DataType, NormalizedDataPoint};
