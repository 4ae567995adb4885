//! gator: a feed aggregator that polls registered RSS feeds on a fixed
//! cadence and stores each new item once.

pub mod aggregator;
pub mod commands;
pub mod config;
pub mod feed;
pub mod storage;
