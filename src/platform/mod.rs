//! Player script access, fragment extraction and execution

pub mod cipher;
pub mod client;
pub mod engine;
pub mod extractor;

pub use cipher::*;
pub use client::*;
pub use engine::*;
pub use extractor::{extract_functions, Anchor};
