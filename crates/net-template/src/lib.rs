//! netprov command templates
//!
//! Turns validated interface parameters into the ordered configuration
//! lines pushed to a device.

pub mod engine;
mod syntax;

pub use engine::TemplateEngine;
