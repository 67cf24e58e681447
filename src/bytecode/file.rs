//! Program files.
//!
//! ```toml
//! name = "sum_of_squares"
//! arity = 2
//! encoding = "wordcode"   # or "legacy"
//! constants = []
//! code = """
//! LOAD_FAST 0
//! LOAD_FAST 0
//! BINARY_MULTIPLY
//! LOAD_FAST 1
//! LOAD_FAST 1
//! BINARY_MULTIPLY
//! BINARY_ADD
//! RETURN_VALUE
//! """
//! ```
//!
//! `bytes = [124, 0, 83, 0]` may be given instead of `code`.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::{Encoding, Program, assemble};
use crate::error::{JitError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramFile {
    pub name: Option<String>,
    pub arity: usize,
    #[serde(default)]
    pub encoding: Encoding,
    #[serde(default)]
    pub constants: Vec<i64>,
    pub code: Option<String>,
    pub bytes: Option<Vec<u8>>,
}

impl ProgramFile {
    /// Parse a program file's contents. `path` is only used in errors.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|source| JitError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load and assemble a program file.
    pub fn load(path: &Path) -> Result<Program> {
        let content = fs::read_to_string(path).map_err(|source| JitError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)?.into_program(path)
    }

    pub fn into_program(self, path: &Path) -> Result<Program> {
        let code = match (self.code, self.bytes) {
            (Some(source), None) => assemble(&source, self.encoding)?,
            (None, Some(bytes)) => bytes,
            (Some(_), Some(_)) => {
                return Err(JitError::ProgramFile {
                    path: path.to_path_buf(),
                    message: "`code` and `bytes` are mutually exclusive".to_string(),
                });
            }
            (None, None) => {
                return Err(JitError::ProgramFile {
                    path: path.to_path_buf(),
                    message: "one of `code` or `bytes` is required".to_string(),
                });
            }
        };

        let name = self.name.unwrap_or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_else(|| "program".to_string())
        });

        Ok(Program::new(
            name,
            code,
            self.constants.into_iter().map(i128::from).collect(),
            self.arity,
            self.encoding,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_text_program() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("times101.toml");
        fs::write(
            &path,
            "arity = 1\nconstants = [101]\ncode = \"\"\"\nLOAD_FAST 0\nLOAD_CONST 0\nBINARY_MULTIPLY\nRETURN_VALUE\n\"\"\"\n",
        )
        .unwrap();

        let program = ProgramFile::load(&path).unwrap();
        assert_eq!(program.name, "times101");
        assert_eq!(program.encoding, Encoding::Wordcode);
        assert_eq!(program.code, vec![124, 0, 100, 0, 20, 0, 83, 0]);
        assert_eq!(program.constants, vec![101]);
    }

    #[test]
    fn test_raw_bytes_legacy() {
        let path = Path::new("identity.toml");
        let file = ProgramFile::parse(
            "name = \"id\"\narity = 1\nencoding = \"legacy\"\nbytes = [124, 0, 0, 83]\n",
            path,
        )
        .unwrap();
        let program = file.into_program(path).unwrap();
        assert_eq!(program.name, "id");
        assert_eq!(program.encoding, Encoding::Legacy);
        assert_eq!(program.code, vec![124, 0, 0, 83]);
    }

    #[test]
    fn test_code_or_bytes_required() {
        let path = Path::new("empty.toml");
        let err = ProgramFile::parse("arity = 0\n", path)
            .unwrap()
            .into_program(path)
            .unwrap_err();
        assert!(matches!(err, JitError::ProgramFile { .. }));
    }
}
