//! Command line argument parsing

use crate::core::format::MediaFormat;
use crate::error::SigError;
use crate::platform::cipher::CipherConfig;
use crate::platform::client::{FetchOptions, HttpClientConfig};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Decipher signatures and n-parameters of video format URLs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// HTTP timeout (e.g., 30s, 1m)
    #[arg(long, global = true, value_name = "DURATION", default_value = "30s")]
    pub timeout: humantime::Duration,

    /// HTTP retries for transient errors
    #[arg(long, global = true, default_value = "3")]
    pub retries: u32,

    /// Override User-Agent header
    #[arg(long, global = true, value_name = "USER_AGENT")]
    pub user_agent: Option<String>,

    /// Extra header for the player request (repeatable)
    #[arg(long = "header", global = true, value_name = "NAME:VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Skip formats that fail instead of aborting
    #[arg(long, global = true)]
    pub lenient: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Rewrite format URLs and print them keyed by final URL
    Decipher {
        /// Player script URL
        #[arg(long, value_name = "URL")]
        player: String,

        /// JSON array of formats ('-' reads stdin)
        #[arg(long, value_name = "FILE", default_value = "-")]
        formats: PathBuf,
    },
    /// Print the functions extracted from a player script
    Extract {
        /// Player script URL
        #[arg(long, value_name = "URL")]
        player: String,
    },
}

impl Args {
    /// Get HTTP timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        self.timeout.into()
    }

    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: self.timeout_duration(),
            max_retries: self.retries,
            user_agent: self.user_agent.clone(),
            ..Default::default()
        }
    }

    pub fn fetch_options(&self) -> FetchOptions {
        self.headers
            .iter()
            .fold(FetchOptions::new(), |options, (name, value)| {
                options.with_header(name, value)
            })
    }

    pub fn cipher_config(&self) -> CipherConfig {
        CipherConfig {
            stop_on_error: !self.lenient,
            fetch_options: self.fetch_options(),
            ..Default::default()
        }
    }

    /// Get output verbosity level
    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Quiet (only errors)
    Quiet,
    /// Normal
    Normal,
    /// Verbose (debug info)
    Verbose,
}

impl VerbosityLevel {
    /// Default log filter for this level
    pub fn log_filter(&self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "info",
            VerbosityLevel::Verbose => "debug",
        }
    }
}

/// Parse a `NAME:VALUE` header argument
pub fn parse_header(header: &str) -> Result<(String, String), String> {
    let (name, value) = header
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got '{}'", header))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{}'", header));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Read a JSON array of formats from a file, or from stdin for `-`
pub fn load_formats(path: &Path) -> Result<Vec<MediaFormat>, SigError> {
    let text = if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        text
    } else {
        std::fs::read_to_string(path)?
    };

    Ok(serde_json::from_str(&text)?)
}
