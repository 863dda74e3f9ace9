//! Loading the batch configuration from a properties file and the environment.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use super::PoolConfiguration;

/// File looked up when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "jberet.properties";

/// Prefix of environment variables that override file options.
pub const ENV_PREFIX: &str = "JOB_STREAMER_";

/// Failure to read an existing configuration file.
#[derive(Debug, Error)]
#[error("failed to load configuration from {path}: {source}")]
pub struct LoadError {
    /// File that could not be read.
    pub path: PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: io::Error,
}

/// Load `path` as a properties file.
///
/// A missing file is not an error: the empty (all-defaults) configuration is
/// returned and a note is logged.
///
/// # Errors
///
/// Returns [`LoadError`] when the file exists but cannot be read.
pub fn load_properties_file(path: &Path) -> Result<PoolConfiguration, LoadError> {
    match fs::read_to_string(path) {
        Ok(text) => {
            let config = parse_properties(&text);
            info!(path = %path.display(), options = config.len(), "Loaded batch configuration");
            Ok(config)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "Configuration file not found, using default configuration");
            Ok(PoolConfiguration::new())
        }
        Err(source) => Err(LoadError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Load `path`, then apply `.env` and process environment overrides.
///
/// # Errors
///
/// Same as [`load_properties_file`].
pub fn load(path: &Path) -> Result<PoolConfiguration, LoadError> {
    let mut config = load_properties_file(path)?;
    if let Ok(env_file) = dotenvy::dotenv() {
        debug!(path = %env_file.display(), "Loaded .env file");
    }
    apply_env_overrides(&mut config, std::env::vars());
    Ok(config)
}

/// Map `JOB_STREAMER_THREAD_POOL_TYPE=fixed` onto `thread-pool-type=fixed`, and so on.
pub fn apply_env_overrides<I>(config: &mut PoolConfiguration, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (name, value) in vars {
        let Some(suffix) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        if suffix.is_empty() {
            continue;
        }
        let key = suffix.to_ascii_lowercase().replace('_', "-");
        debug!(key = %key, "Configuration option overridden from environment");
        config.insert(key, value);
    }
}

/// Parse properties-file text.
///
/// Supports `#`/`!` comments, `=`, `:` or whitespace separators, trailing
/// backslash line continuation and the usual backslash escapes.
#[must_use]
pub fn parse_properties(text: &str) -> PoolConfiguration {
    let mut config = PoolConfiguration::new();
    let mut lines = text.lines();
    while let Some(first) = lines.next() {
        let trimmed = first.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = String::from(trimmed);
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_entry(&logical);
        config.insert(unescape(key), unescape(value));
    }
    config
}

/// Odd number of trailing backslashes.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (idx, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..idx], line[idx + 1..].trim_start()),
            c if c.is_whitespace() => {
                let rest = line[idx..].trim_start();
                let rest = rest
                    .strip_prefix('=')
                    .or_else(|| rest.strip_prefix(':'))
                    .unwrap_or(rest);
                return (&line[..idx], rest.trim_start());
            }
            _ => {}
        }
    }
    (line, "")
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
