pub mod analysis;
pub mod commands;
pub mod datetime_utils;
pub mod freq;
pub mod rate_limit;
pub mod report;
pub mod storage;
pub mod timeline;
pub mod twitter;
pub mod words;
