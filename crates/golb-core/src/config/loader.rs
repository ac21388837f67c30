//! Path-safe configuration file loading.
//!
//! Mirrors the donor's `config/settings.rs` path-safety idiom: canonicalize the path, refuse to
//! read outside the process's working directory, and cap file size before parsing so a malicious
//! or accidental symlink/huge file can't be handed to the grammar parser.

use std::fs;
use std::path::Path;

use crate::error::GatewayError;

use super::grammar::{self, ParsedConfig};
use super::validation::{self, ValidationResult};

/// Maximum configuration file size accepted by [`load_from_path`].
pub const MAX_CONFIG_FILE_BYTES: u64 = 10 * 1024 * 1024;

fn canonicalize_within_cwd(path: &Path) -> Result<std::path::PathBuf, GatewayError> {
    let canonical = fs::canonicalize(path).map_err(|e| {
        GatewayError::ConfigurationError(format!("cannot resolve config path '{}': {}", path.display(), e))
    })?;
    let cwd = std::env::current_dir().map_err(|e| {
        GatewayError::ConfigurationError(format!("cannot resolve working directory: {}", e))
    })?;
    let canonical_cwd = fs::canonicalize(&cwd).unwrap_or(cwd);
    if !canonical.starts_with(&canonical_cwd) {
        return Err(GatewayError::ConfigurationError(format!(
            "config path '{}' escapes the working directory",
            path.display()
        )));
    }
    Ok(canonical)
}

/// Loads and parses a configuration file, rejecting paths outside the working directory and
/// files larger than [`MAX_CONFIG_FILE_BYTES`]. Does not validate cross-references; call
/// [`validate_parsed`] (or [`crate::config::validation::validate`] directly) on the result.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ParsedConfig, GatewayError> {
    let path = path.as_ref();
    let resolved = canonicalize_within_cwd(path)?;

    let metadata = fs::metadata(&resolved).map_err(|e| {
        GatewayError::ConfigurationError(format!("cannot stat config file: {}", e))
    })?;
    if metadata.len() > MAX_CONFIG_FILE_BYTES {
        return Err(GatewayError::ConfigurationError(format!(
            "config file '{}' exceeds the {}-byte limit",
            resolved.display(),
            MAX_CONFIG_FILE_BYTES
        )));
    }

    let contents = fs::read_to_string(&resolved).map_err(|e| {
        GatewayError::ConfigurationError(format!("cannot read config file: {}", e))
    })?;

    grammar::parse(&contents)
}

/// Loads, parses, and validates a configuration file in one call. Returns the parsed config
/// alongside the validation report so the caller can decide whether warnings are acceptable.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<(ParsedConfig, ValidationResult), GatewayError> {
    let parsed = load_from_path(path)?;
    let result = validation::validate(&parsed);
    if !result.is_valid {
        return Err(GatewayError::ConfigurationError(result.errors.join("; ")));
    }
    Ok((parsed, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // std::env::set_current_dir is process-global; serialize the tests in this module that
    // touch it so they don't race under the default multi-threaded test runner.
    static CWD_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn loads_a_valid_config_from_disk() {
        let _guard = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("golb.conf");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "upstream backend {{\n  server http://h:80\n}}\nmethod round_robin\n").unwrap();

        let original_cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let result = load_and_validate("golb.conf");
        std::env::set_current_dir(original_cwd).unwrap();

        let (config, validation) = result.unwrap();
        assert!(validation.is_valid);
        assert_eq!(config.upstreams.len(), 1);
    }

    #[test]
    fn rejects_a_path_outside_the_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().parent().unwrap().join("definitely-not-here.conf");
        let err = load_from_path(outside).unwrap_err();
        assert!(matches!(err, GatewayError::ConfigurationError(_)));
    }

    #[test]
    fn invalid_config_fails_load_and_validate() {
        let _guard = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("golb.conf");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "route path /api/ ghost\n").unwrap();

        let original_cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let result = load_and_validate("golb.conf");
        std::env::set_current_dir(original_cwd).unwrap();

        assert!(result.is_err());
    }
}
