#![forbid(unsafe_code)]

//! Channel tracking library behind the `tubetrack` binary.
//!
//! Channel references are resolved to canonical IDs, uploads are pulled from
//! the Data API or the public feed, and everything lands in a local SQLite
//! database with per-video seen state.

pub mod assistant;
pub mod channel_id;
pub mod config;
pub mod data_api;
pub mod feed;
pub mod http;
pub mod resolver;
pub mod store;
pub mod tracker;
pub mod uploads;

#[cfg(test)]
pub(crate) mod testing;
