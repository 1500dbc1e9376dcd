//! # Web Server Implementation
//!
//! The matchup board's web face: week pages with the probability heatmap
//! and ceremony table, an SVG endpoint, and a small JSON API for week
//! discovery and viewport relayout.
//!
//! ## Submodules
//! - `handlers`: Actix request handlers for the pages and the API routes.
//! - `utils`: Formatting helpers used by the page handlers.

/// Request handlers for the web server's routes.
pub mod handlers;
/// Formatting helpers for the web server.
pub mod utils;
