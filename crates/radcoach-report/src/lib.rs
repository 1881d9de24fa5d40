//! Report rendering for radcoach.
//!
//! JSON and markdown live next to the report types in `radcoach-core`;
//! this crate adds the standalone HTML page.

pub mod html;

pub use html::{generate_html, write_html_report};
