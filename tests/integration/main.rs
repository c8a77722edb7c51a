//! Integration tests for the crawl engine
//!
//! Sessions run end to end against temporary SQLite files, with mock sources
//! for deterministic scheduling and wiremock servers for the HTML directory
//! source.

mod common;
mod html_source_tests;
mod session_tests;
