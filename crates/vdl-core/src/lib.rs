pub mod config;
pub mod logging;

pub mod checksum;
pub mod control;
pub mod engine;
pub mod fetch;
pub mod merge;
pub mod orchestrator;
pub mod playlist;
pub mod pool;
pub mod rate_limit;
pub mod resolver;
pub mod retry;
pub mod segmenter;
pub mod storage;
pub mod task;
