//! News ingestion pipeline: scrape sources, pick articles worth sharing,
//! draft posts with a text-generation provider and publish them to X.

pub mod ai;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod services;

#[cfg(test)]
mod testing;
