// src/lib.rs

pub mod config;

pub mod entities {
    pub mod prelude;
    pub mod backfill_progress;
    pub mod energy_data_points;
}

pub mod services {
    pub mod entsoe;
    pub mod processor;
    pub mod storage;
    pub mod data_points;
    pub mod backfill_progress;
    pub mod gap_detector;
    pub mod backfill;
}

pub mod models;
pub mod jobs;
