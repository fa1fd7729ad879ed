//! Core data types for ytsig

pub mod format;

pub use format::*;
