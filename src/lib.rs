//! # ytsig - player signature deciphering
//!
//! Extracts the signature decipher and n-parameter transform routines from
//! a video player script and uses them to turn ciphered format descriptors
//! into directly fetchable URLs.
//!
//! ## Features
//!
//! - Anchor-based extraction of both routines from minified player.js
//! - Literal-aware boundary scanning of JavaScript bodies
//! - Per-player fragment cache with deduplicated concurrent population
//! - Isolated V8 execution of every fragment
//! - In-place format URL rewriting, strict or lenient per batch
//!
//! ## Example
//!
//! ```rust,no_run
//! use ytsig::{Cipher, MediaFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cipher = Cipher::new()?;
//!     let mut formats = vec![MediaFormat::with_signature_cipher(
//!         "s=AOq0QJ8w&sp=sig&url=https%3A%2F%2Fexample.googlevideo.com%2Fvideoplayback%3Fn%3DaBcD",
//!     )];
//!
//!     let player = "https://www.youtube.com/s/player/0123abcd/player_ias.vflset/en_US/base.js";
//!     let deciphered = cipher.decipher_formats(&mut formats, player).await?;
//!     for url in deciphered.keys() {
//!         println!("{}", url);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod core;
pub mod error;
pub mod platform;
pub mod utils;

// Re-export main types
pub use crate::core::{CipherArgs, ExtractedFunctions, MediaFormat, PlayerScript};
pub use error::SigError;
pub use platform::{
    extract_functions, Cipher, CipherConfig, DenoEngine, FetchOptions, HttpClientConfig,
    PlayerClient, ScriptEngine, ScriptFetcher,
};
pub use utils::ScriptCache;

/// Result type alias for ytsig operations
pub type Result<T> = std::result::Result<T, SigError>;
