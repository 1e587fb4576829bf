use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("failed to decode configuration: {0}")]
    Decode(String),

    #[error("you must have jwt.expression_string or jwt.expression_path defined")]
    MissingExpression,

    #[error("jwt.expression_string and jwt.expression_path are mutually exclusive")]
    AmbiguousExpression,

    #[error("error reading expression file {}: {message}", path.display())]
    ReadExpression { path: PathBuf, message: String },

    #[error("trust domain must not be empty")]
    EmptyTrustDomain,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Plugin configuration document.
///
/// ```json
/// {
///   "jwt": { "expression_path": "/etc/spire/jwt.cel" },
///   "cost_limit": 100000
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComposerConfig {
    #[serde(default)]
    pub jwt: JwtConfig,

    /// Evaluation step budget for the JWT expression. Unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_limit: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JwtConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression_string: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression_path: Option<PathBuf>,
}

impl ComposerConfig {
    pub fn inline(expression: impl Into<String>) -> Self {
        Self {
            jwt: JwtConfig {
                expression_string: Some(expression.into()),
                expression_path: None,
            },
            cost_limit: None,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            ConfigError::Decode(format!("failed to open {}: {}", path.as_ref().display(), e))
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| ConfigError::Decode(e.to_string()))
    }

    pub fn from_json(s: &str) -> ConfigResult<Self> {
        serde_json::from_str(s).map_err(|e| ConfigError::Decode(e.to_string()))
    }

    pub fn validate(&self) -> ConfigResult<()> {
        match (&self.jwt.expression_string, &self.jwt.expression_path) {
            (None, None) => Err(ConfigError::MissingExpression),
            (Some(_), Some(_)) => Err(ConfigError::AmbiguousExpression),
            _ => Ok(()),
        }
    }

    /// Returns the JWT expression source, reading it from disk when the
    /// configuration names a file.
    pub fn resolve_expression(&self) -> ConfigResult<String> {
        self.validate()?;
        match (&self.jwt.expression_string, &self.jwt.expression_path) {
            (Some(source), _) => Ok(source.clone()),
            (None, Some(path)) => {
                std::fs::read_to_string(path).map_err(|e| ConfigError::ReadExpression {
                    path: path.clone(),
                    message: e.to_string(),
                })
            }
            (None, None) => Err(ConfigError::MissingExpression),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_decode_inline() {
        let config =
            ComposerConfig::from_json(r#"{"jwt": {"expression_string": "request"}}"#).unwrap();
        assert_eq!(config, ComposerConfig::inline("request"));
        assert_eq!(config.resolve_expression().unwrap(), "request");
    }

    #[test]
    fn test_decode_rejects_unknown_fields() {
        let err = ComposerConfig::from_json(r#"{"jwt": {"expression": "x"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Decode(_)));
    }

    #[test]
    fn test_exactly_one_expression_source() {
        assert_eq!(
            ComposerConfig::default().validate(),
            Err(ConfigError::MissingExpression)
        );
        let both = ComposerConfig {
            jwt: JwtConfig {
                expression_string: Some("request".into()),
                expression_path: Some("/tmp/x.cel".into()),
            },
            cost_limit: None,
        };
        assert_eq!(both.validate(), Err(ConfigError::AmbiguousExpression));
    }

    #[test]
    fn test_expression_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "trust_domain").unwrap();
        let config = ComposerConfig {
            jwt: JwtConfig {
                expression_string: None,
                expression_path: Some(file.path().to_path_buf()),
            },
            cost_limit: Some(10),
        };
        assert_eq!(config.resolve_expression().unwrap(), "trust_domain");
    }

    #[test]
    fn test_missing_expression_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ComposerConfig {
            jwt: JwtConfig {
                expression_string: None,
                expression_path: Some(dir.path().join("missing.cel")),
            },
            cost_limit: None,
        };
        assert!(matches!(
            config.resolve_expression(),
            Err(ConfigError::ReadExpression { .. })
        ));
    }

    #[test]
    fn test_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"jwt": {{"expression_string": "request"}}, "cost_limit": 5}}"#).unwrap();
        let config = ComposerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.cost_limit, Some(5));
    }
}
