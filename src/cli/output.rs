//! Output formatting

use crate::cli::args::VerbosityLevel;
use crate::core::format::{ExtractedFunctions, MediaFormat};
use crate::error::SigError;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Output formatter for ytsig.
///
/// Results go to stdout; status messages go to stderr so the JSON output
/// stays pipeable.
pub struct OutputFormatter {
    verbosity: VerbosityLevel,
}

impl OutputFormatter {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self { verbosity }
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("ℹ️  {}", message);
        }
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("✅ {}", message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        eprintln!("❌ {}", message);
    }

    /// Print the rewritten formats keyed by URL
    pub fn print_formats(&self, formats: &HashMap<String, MediaFormat>) -> Result<(), SigError> {
        println!("{}", render_formats(formats)?);
        Ok(())
    }

    /// Print extracted functions
    pub fn print_functions(&self, functions: &ExtractedFunctions) -> Result<(), SigError> {
        println!("{}", serde_json::to_string_pretty(functions)?);
        Ok(())
    }

    pub fn print_summary(&self, deciphered: usize, total: usize, elapsed: Duration) {
        if deciphered == total {
            self.success(&format!(
                "Deciphered {} format(s) in {}",
                total,
                format_duration(elapsed)
            ));
        } else {
            self.info(&format!(
                "Deciphered {} of {} format(s) in {}",
                deciphered,
                total,
                format_duration(elapsed)
            ));
        }
    }
}

/// Pretty JSON object of formats, keys in sorted order
pub fn render_formats(formats: &HashMap<String, MediaFormat>) -> Result<String, SigError> {
    let sorted: BTreeMap<&String, &MediaFormat> = formats.iter().collect();
    Ok(serde_json::to_string_pretty(&sorted)?)
}

/// Format a short duration as a human-readable string
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}
