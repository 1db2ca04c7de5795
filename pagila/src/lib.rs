//! Runs the pagila movie-rental reports and renders their results.

pub use pagila_core::*;

pub mod render;
