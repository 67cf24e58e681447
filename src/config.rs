//! Compiler configuration types.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{JitError, Result};

/// JIT compilation mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitMode {
    /// JIT disabled, interpreter only
    Off,
    /// JIT required: compilation failures are reported to the caller
    On,
    /// Automatic: compile, and fall back to the interpreter on failure
    #[default]
    Auto,
}

/// Configuration for a [`JitCompiler`](crate::jit::JitCompiler).
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// jit_mode = "on"
/// optimize = false
/// code_size = 8192
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JitConfig {
    pub jit_mode: JitMode,
    /// Run the peephole optimizer before emission
    pub optimize: bool,
    /// Code buffer capacity in bytes (0 = one page). Always rounded up to
    /// whole pages.
    pub code_size: usize,
    /// Maximum operand stack depth accepted by the verifier
    pub max_stack: usize,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            jit_mode: JitMode::Auto,
            optimize: true,
            code_size: 0,
            max_stack: 256,
        }
    }
}

impl JitConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| JitError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| JitError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: JitConfig = toml::from_str("jit_mode = \"off\"\n").unwrap();
        assert_eq!(config.jit_mode, JitMode::Off);
        assert!(config.optimize);
        assert_eq!(config.max_stack, 256);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(toml::from_str::<JitConfig>("trace = true\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jit.toml");
        fs::write(&path, "optimize = false\ncode_size = 8192\n").unwrap();

        let config = JitConfig::load(&path).unwrap();
        assert!(!config.optimize);
        assert_eq!(config.code_size, 8192);
        assert_eq!(config.jit_mode, JitMode::Auto);
    }

    #[test]
    fn test_load_missing_file() {
        let err = JitConfig::load(Path::new("/nonexistent/jit.toml")).unwrap_err();
        assert!(matches!(err, JitError::Io { .. }));
    }
}
