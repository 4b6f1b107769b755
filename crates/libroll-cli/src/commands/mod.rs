//! Command implementations.
//!
//! - [`build`] - bundle one workspace library

pub mod build;

pub use build::execute as build_execute;
