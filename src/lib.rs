//! Community feed library.
//!
//! Pulls hot posts from an upstream community, normalizes and stores them,
//! and serves them back as a paginated, optionally translated feed.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod feed;
pub mod ingest;
pub mod model;
pub mod reader;
pub mod store;
pub mod web;
