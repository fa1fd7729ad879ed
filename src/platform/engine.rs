//! JavaScript execution of extracted player fragments

use crate::error::SigError;
use crate::utils::js::is_ident_byte;
use deno_core::{FastString, JsRuntime, RuntimeOptions};
use tracing::debug;

/// Runs one fragment against a set of bound variables.
///
/// Implementations must not keep state between calls: every call sees only
/// the fragment and its bindings.
pub trait ScriptEngine: Send + Sync {
    /// Evaluate `source` with each `(name, value)` binding in scope and return
    /// the completion value of its last statement.
    fn execute(&self, source: &str, bindings: &[(&str, &str)]) -> Result<String, SigError>;
}

/// V8 engine backed by `deno_core`; every call runs in a fresh runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenoEngine;

impl DenoEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ScriptEngine for DenoEngine {
    fn execute(&self, source: &str, bindings: &[(&str, &str)]) -> Result<String, SigError> {
        let code = wrap_fragment(source, bindings)?;
        debug!(
            "Executing fragment ({} chars, {} binding(s))",
            source.len(),
            bindings.len()
        );

        let mut runtime = JsRuntime::new(RuntimeOptions::default());
        let result = runtime
            .execute_script("<fragment>", FastString::from(code))
            .map_err(|e| SigError::FragmentExecution(e.to_string()))?;

        let scope = &mut runtime.handle_scope();
        let value = result.open(scope);
        if value.is_null_or_undefined() {
            return Err(SigError::FragmentExecution(
                "fragment returned no value".to_string(),
            ));
        }
        Ok(value.to_rust_string_lossy(scope))
    }
}

/// Wrap a fragment in a function whose parameters are the binding names and
/// call it with the binding values:
///
/// `(function(sig){return eval("<source>");})("<value>")`
///
/// Direct `eval` keeps the fragment's declarations local to the call and
/// yields the completion value of its last statement.
pub fn wrap_fragment(source: &str, bindings: &[(&str, &str)]) -> Result<String, SigError> {
    if let Some((name, _)) = bindings.iter().find(|(name, _)| !is_identifier(name)) {
        return Err(SigError::FragmentExecution(format!(
            "invalid binding name: {:?}",
            name
        )));
    }

    let names: Vec<&str> = bindings.iter().map(|(name, _)| *name).collect();
    let values = bindings
        .iter()
        .map(|(_, value)| serde_json::to_string(value))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(format!(
        "(function({}){{return eval({});}})({})",
        names.join(","),
        serde_json::to_string(source)?,
        values.join(",")
    ))
}

fn is_identifier(name: &str) -> bool {
    match name.as_bytes().first() {
        Some(first) if !first.is_ascii_digit() => name.bytes().all(is_ident_byte),
        _ => false,
    }
}
