//! Utility functions for ytsig

pub mod cache;
pub mod js;
pub mod url;

pub use self::cache::*;
pub use self::js::{between, cut_after_js, scan_balanced};
pub use self::url::*;
