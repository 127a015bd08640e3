pub mod gap_analysis_sync;
pub mod realtime_collection_sync;
