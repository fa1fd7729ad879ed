//! Extraction of the signature decipher and n-transform routines from
//! player.js
//!
//! The player is minified and its identifiers change on every release, so
//! both routines are located through textual anchors around their call
//! sites. Each anchor lives in one constant below; when the player layout
//! changes, this is the only place that needs updating.

use crate::core::format::ExtractedFunctions;
use crate::utils::js::{between, cut_after_js, is_ident_byte};
use tracing::debug;

/// Pair of markers enclosing an identifier in the player source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    /// Label used in logs
    pub label: &'static str,
    pub left: &'static str,
    pub right: &'static str,
}

impl Anchor {
    /// Identifier enclosed by this anchor, if present
    pub fn find<'a>(&self, haystack: &'a str) -> Option<&'a str> {
        let found = between(haystack, self.left, self.right);
        if found.is_none() {
            debug!("Anchor '{}' not found", self.label);
        }
        found
    }
}

/// Call site of the decipher routine: `c&&(c=NAME(decodeURIComponent(c))`
pub const DECIPHER_CALL: Anchor = Anchor {
    label: "decipher call",
    left: r#"a.set("alr","yes");c&&(c="#,
    right: "(decodeURIC",
};

/// First helper call inside the decipher body: `a=a.split("");HELPERS.xx(a,1)`
pub const HELPER_OBJECT: Anchor = Anchor {
    label: "helper object",
    left: r#"a=a.split("");"#,
    right: ".",
};

/// Call site of the n-transform routine: `&&(b=NAME(b)` or `&&(b=NAME[0](b)`
pub const N_TRANSFORM_CALL: Anchor = Anchor {
    label: "n-transform call",
    left: r#"&&(b=a.get("n"))&&(b="#,
    right: "(b)",
};

/// Variable bound to the scrambled signature when a decipher fragment runs
pub const SIGNATURE_VAR: &str = "sig";

/// Variable bound to the `n` value when an n-transform fragment runs
pub const NCODE_VAR: &str = "ncode";

/// Extract both routines from a player script.
///
/// Each routine is located independently; a missing anchor or definition
/// leaves that fragment absent.
pub fn extract_functions(body: &str) -> ExtractedFunctions {
    let functions = ExtractedFunctions {
        decipher: extract_decipher(body),
        n_transform: extract_n_transform(body),
    };
    debug!(
        "Extracted {} fragment(s) from player.js ({} chars)",
        functions.len(),
        body.len()
    );
    functions
}

fn extract_decipher(body: &str) -> Option<String> {
    let name = DECIPHER_CALL.find(body)?;
    let function = extract_function(body, name)?;

    let fragment = match extract_helpers(body, &function) {
        Some(helpers) => format!("{};{};{}({});", helpers, function, name, SIGNATURE_VAR),
        None => {
            debug!("Decipher function {} has no helper object", name);
            format!("{};{}({});", function, name, SIGNATURE_VAR)
        }
    };

    debug!("Found decipher function {} ({} chars)", name, fragment.len());
    Some(fragment)
}

fn extract_n_transform(body: &str) -> Option<String> {
    let mut name = N_TRANSFORM_CALL.find(body)?;
    if name.contains('[') {
        name = resolve_array_alias(body, name)?;
    }

    let function = extract_function(body, name)?;
    let fragment = format!("{};{}({});", function, name, NCODE_VAR);

    debug!("Found n-transform function {} ({} chars)", name, fragment.len());
    Some(fragment)
}

/// Resolve `Iw[0]` to `zo` given `var Iw=[zo];` somewhere in the player.
///
/// Only the one-element array alias the player uses is understood.
fn resolve_array_alias<'a>(body: &'a str, indexed: &str) -> Option<&'a str> {
    let array = indexed.split('[').next()?;
    let declaration = format!("var {}=[", array);
    let elements = between(body, &declaration, "]")?;
    let first = elements.split(',').next()?.trim();

    if first.is_empty() {
        debug!("Array alias {} has no elements", array);
        return None;
    }
    debug!("Resolved array alias {} to {}", indexed, first);
    Some(first)
}

/// `var NAME=function(a){...}` for the first definition of `NAME`
fn extract_function(body: &str, name: &str) -> Option<String> {
    let start = format!("{}=function(a)", name);
    let Some(ndx) = find_definition(body, &start) else {
        debug!("Definition of {} not found", name);
        return None;
    };

    match cut_after_js(body[ndx + start.len()..].trim_start()) {
        Ok(code) => Some(format!("var {}{}", start, code)),
        Err(e) => {
            debug!("Could not bound body of {}: {}", name, e);
            None
        }
    }
}

/// `var HELPERS={...}` for the helper object referenced by a decipher body
fn extract_helpers(body: &str, function: &str) -> Option<String> {
    let name = HELPER_OBJECT.find(function)?;
    let start = format!("var {}={{", name);
    let ndx = body.find(&start)?;

    match cut_after_js(&body[ndx + start.len() - 1..]) {
        Ok(object) => Some(format!("var {}={}", name, object)),
        Err(e) => {
            debug!("Could not bound helper object {}: {}", name, e);
            None
        }
    }
}

/// Offset of the first occurrence of `pattern` not preceded by an
/// identifier character, so `dF=` never matches inside `xdF=`.
fn find_definition(body: &str, pattern: &str) -> Option<usize> {
    body.match_indices(pattern)
        .map(|(ndx, _)| ndx)
        .find(|&ndx| ndx == 0 || !is_ident_byte(body.as_bytes()[ndx - 1]))
}
