use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Marshaling limits applied to arguments coming from the script VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Longest string (in characters) decoded for an `s` argument.
    #[serde(default = "default_max_string_len")]
    pub max_string_len: usize,

    /// Largest element count accepted for `a` and `v` arguments.
    #[serde(default = "default_max_array_len")]
    pub max_array_len: usize,

    /// Reject VM strings that are not valid UTF-8 instead of decoding them lossily.
    #[serde(default)]
    pub strict_utf8: bool,
}

fn default_max_string_len() -> usize {
    64 * 1024
}

fn default_max_array_len() -> usize {
    64 * 1024
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_string_len: default_max_string_len(),
            max_array_len: default_max_array_len(),
            strict_utf8: false,
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).context("Failed to parse bridge config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read bridge config {}", path.display()))?;
        Self::from_toml_str(&source)
            .with_context(|| format!("Invalid bridge config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.max_string_len, 65536);
        assert!(!config.strict_utf8);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = BridgeConfig::from_toml_str("strict_utf8 = true\nmax_array_len = 16\n").unwrap();
        assert!(config.strict_utf8);
        assert_eq!(config.max_array_len, 16);
        assert_eq!(config.max_string_len, 65536);
    }

    #[test]
    fn serialized_config_loads_back() {
        let config = BridgeConfig {
            max_string_len: 256,
            max_array_len: 8,
            strict_utf8: true,
        };
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("strict_utf8 = true"));
        assert_eq!(BridgeConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn wrong_type_is_an_error() {
        assert!(BridgeConfig::from_toml_str("max_string_len = \"big\"").is_err());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_string_len = 128").unwrap();
        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.max_string_len, 128);
    }

    #[test]
    fn load_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = BridgeConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
