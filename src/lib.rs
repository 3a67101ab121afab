// src/lib.rs

//! Job listing aggregator.
//!
//! Runs a set of source adapters concurrently behind one rate-limited,
//! retrying fetcher, cleans and deduplicates what they find, stores the
//! dataset and notifies recipients whose keywords match.

pub mod error;
pub mod fetch;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod sources;
pub mod storage;
pub mod utils;
