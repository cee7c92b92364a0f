use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::{RelaunchError, Result};
use crate::store::ConfigMap;

pub const TOKEN_PREFIX: &str = "env.";

/// Load `.env` from `cwd` into the process env, without overriding values
/// already set. Returns the file names that were loaded.
pub fn load_env(cwd: &Path) -> Result<Vec<String>> {
    let mut loaded = Vec::new();

    let base = cwd.join(".env");
    if base.exists() {
        dotenvy::from_path(&base).map_err(|e| {
            RelaunchError::usage(format!("failed to load {}: {e}", base.display()))
        })?;
        loaded.push(".env".to_string());
    }

    Ok(loaded)
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // ASCII word characters only.
    RE.get_or_init(|| Regex::new(r"env\.([0-9A-Za-z_]+)").expect("static regex"))
}

/// Replace every `env.NAME` token in `input` with `vars[NAME]`.
///
/// One pass, left to right, over non-overlapping matches. Tokens naming an
/// absent key are kept verbatim. If any `env.` is left in the output,
/// including one introduced by a replacement, the result is
/// [`RelaunchError::UnresolvedReference`].
pub fn substitute(input: &str, vars: &ConfigMap) -> Result<String> {
    let out = token_re().replace_all(input, |caps: &Captures<'_>| match vars.get(&caps[1]) {
        Some(v) => v.clone(),
        None => caps[0].to_string(),
    });

    if out.contains(TOKEN_PREFIX) {
        return Err(RelaunchError::UnresolvedReference {
            input: out.into_owned(),
        });
    }
    Ok(out.into_owned())
}

/// Whether any of `values` holds an `env.<key>` token naming exactly `key`.
pub fn references<'v>(values: impl IntoIterator<Item = &'v str>, key: &str) -> bool {
    values
        .into_iter()
        .any(|value| token_re().captures_iter(value).any(|caps| &caps[1] == key))
}
