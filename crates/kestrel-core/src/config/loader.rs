//! YAML loading and `${VAR}` / `${VAR:default}` substitution.

use crate::error::{CoreError, CoreResult};
use serde_yaml::Value;
use std::path::Path;
use tracing::{error, info, warn};

/// Load a YAML file and resolve every `${...}` span in its string values.
///
/// # Errors
///
/// `CoreError::NotFound` if the file does not exist, `CoreError::Parse` if the
/// text is not well-formed YAML.
pub fn load(path: impl AsRef<Path>) -> CoreResult<Value> {
    let path = path.as_ref();
    if !path.exists() {
        error!(path = %path.display(), "configuration file not found");
        return Err(CoreError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_yaml::from_str(&content).map_err(|source| {
        error!(path = %path.display(), error = %source, "failed to parse configuration file");
        CoreError::Parse { path: path.to_path_buf(), source }
    })?;

    let value = substitute(value);
    info!(path = %path.display(), "configuration loaded");
    Ok(value)
}

/// Resolve `${...}` spans against the process environment.
pub fn substitute(value: Value) -> Value {
    substitute_with(value, &env_lookup)
}

/// Resolve `${...}` spans using `lookup` for variable values.
///
/// Mappings and sequences are walked recursively; only string leaves are
/// rewritten. Mapping keys are left as they are.
pub fn substitute_with<F>(value: Value, lookup: &F) -> Value
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(s) => Value::String(substitute_str_with(&s, lookup)),
        Value::Sequence(items) => {
            Value::Sequence(items.into_iter().map(|item| substitute_with(item, lookup)).collect())
        }
        Value::Mapping(map) => Value::Mapping(
            map.into_iter().map(|(key, item)| (key, substitute_with(item, lookup))).collect(),
        ),
        Value::Tagged(mut tagged) => {
            let inner = std::mem::take(&mut tagged.value);
            tagged.value = substitute_with(inner, lookup);
            Value::Tagged(tagged)
        }
        other => other,
    }
}

/// Resolve `${...}` spans in a single string against the process environment.
pub fn substitute_str(input: &str) -> String {
    substitute_str_with(input, &env_lookup)
}

/// Resolve `${...}` spans in a single string.
///
/// Spans are resolved left to right in one pass: the lookup value wins, then
/// the literal default after the first `:`, otherwise the span is kept
/// verbatim and a warning is logged. Text produced by a substitution is never
/// rescanned. An unterminated `${` ends scanning and the remainder is copied
/// through untouched.
pub fn substitute_str_with<F>(input: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        let body = &rest[start + 2..];
        let Some(end) = body.find('}') else {
            break;
        };

        out.push_str(&rest[..start]);

        let token = &body[..end];
        let (name, default) = match token.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (token, None),
        };

        match lookup(name).or_else(|| default.map(str::to_string)) {
            Some(resolved) => out.push_str(&resolved),
            None => {
                warn!(variable = name, "environment variable not set and no default given");
                out.push_str(&rest[start..start + end + 3]);
            }
        }

        rest = &body[end + 1..];
    }

    out.push_str(rest);
    out
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
