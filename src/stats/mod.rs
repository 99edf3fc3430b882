//! Session statistics for the Fallwatch agent.

pub mod log;

pub use log::{
    create_shared_stats, create_shared_stats_with_persistence, SessionStats, SharedStatsLog,
    StatsLog,
};
