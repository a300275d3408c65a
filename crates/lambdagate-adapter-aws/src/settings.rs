use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::binary::BinaryPolicy;
use crate::trace::TracingMode;

/// Optional settings file read from the bundle root.
pub const SETTINGS_FILE: &str = "lambdagate.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid settings")]
    Parse(#[from] toml::de::Error),
    #[error("settings failed validation")]
    Invalid(#[from] ValidationErrors),
}

pub struct SettingsLoader {
    settings: AdapterSettings,
}

impl SettingsLoader {
    pub fn load_from_str(contents: &str) -> Result<Self, SettingsError> {
        let settings: AdapterSettings = toml::from_str(contents)?;
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn from_path(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_from_str(&contents)
    }

    /// Load `lambdagate.toml` from `bundle_root`, falling back to defaults when it is absent.
    pub fn load_or_default(bundle_root: &Path) -> Result<Self, SettingsError> {
        let path = bundle_root.join(SETTINGS_FILE);
        if !path.is_file() {
            return Ok(Self {
                settings: AdapterSettings::default(),
            });
        }
        Self::from_path(&path)
    }

    pub fn settings(&self) -> &AdapterSettings {
        &self.settings
    }

    pub fn into_settings(self) -> AdapterSettings {
        self.settings
    }
}

#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct AdapterSettings {
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub tracing: TracingSettings,
    #[serde(default)]
    #[validate(nested)]
    pub binary: BinarySettings,
}

impl AdapterSettings {
    pub fn binary_policy(&self) -> BinaryPolicy {
        BinaryPolicy::from_types(&self.binary.types)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TracingSettings {
    #[serde(default)]
    pub mode: TracingMode,
}

/// Content types whose bodies are returned base64 encoded.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct BinarySettings {
    #[serde(default = "default_binary_types")]
    #[validate(custom(function = "validate_binary_types"))]
    pub types: Vec<String>,
}

impl Default for BinarySettings {
    fn default() -> Self {
        Self {
            types: default_binary_types(),
        }
    }
}

fn default_binary_types() -> Vec<String> {
    vec!["*/*".to_string()]
}

fn validate_binary_types(types: &[String]) -> Result<(), ValidationError> {
    for pattern in types {
        let Some((kind, subtype)) = pattern.trim().split_once('/') else {
            return Err(ValidationError::new("binary_type")
                .with_message(format!("`{pattern}` is not a media type").into()));
        };
        if kind.is_empty() || subtype.is_empty() {
            return Err(ValidationError::new("binary_type")
                .with_message(format!("`{pattern}` is not a media type").into()));
        }
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "off" => Ok(Self::Off),
            other => Err(serde::de::Error::custom(format!(
                "unsupported log level `{}`",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn empty_file_uses_defaults() {
        let loader = SettingsLoader::load_from_str("").expect("settings");
        let settings = loader.settings();
        assert_eq!(settings.logging.level, LogLevel::Info);
        assert_eq!(settings.logging.format, LogFormat::Text);
        assert_eq!(settings.tracing.mode, TracingMode::Decorate);
        assert_eq!(settings.binary.types, vec!["*/*".to_string()]);
        assert_eq!(settings.binary_policy(), BinaryPolicy::All);
    }

    #[test]
    fn parses_all_sections() {
        let loader = SettingsLoader::load_from_str(
            r#"
            [logging]
            level = "DEBUG"
            format = "json"

            [tracing]
            mode = "annotate"

            [binary]
            types = ["image/*", "application/octet-stream"]
            "#,
        )
        .expect("settings");
        let settings = loader.into_settings();
        assert_eq!(settings.logging.level, LogLevel::Debug);
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.tracing.mode, TracingMode::Annotate);
        assert_eq!(
            settings.binary_policy(),
            BinaryPolicy::Types(vec![
                "image/*".to_string(),
                "application/octet-stream".to_string()
            ])
        );
    }

    #[test]
    fn empty_binary_list_disables_encoding() {
        let loader = SettingsLoader::load_from_str("[binary]\ntypes = []").expect("settings");
        assert_eq!(loader.settings().binary_policy(), BinaryPolicy::None);
    }

    #[test]
    fn rejects_unknown_log_level() {
        let err = SettingsLoader::load_from_str("[logging]\nlevel = \"loud\"")
            .err()
            .expect("invalid level");
        assert!(matches!(err, SettingsError::Parse(_)));
        let rendered = format!("{:#}", anyhow::Error::new(err));
        assert!(rendered.starts_with("invalid settings: "));
        assert_eq!(rendered.matches("unsupported log level `loud`").count(), 1);
    }

    #[test]
    fn rejects_malformed_binary_types() {
        let err = SettingsLoader::load_from_str("[binary]\ntypes = [\"png\"]")
            .err()
            .expect("invalid type");
        assert!(matches!(err, SettingsError::Invalid(_)));
        let rendered = format!("{:#}", anyhow::Error::new(err));
        assert_eq!(rendered.matches("`png` is not a media type").count(), 1);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempdir().expect("tempdir");
        let loader = SettingsLoader::load_or_default(dir.path()).expect("settings");
        assert_eq!(loader.settings().tracing.mode, TracingMode::Decorate);
    }

    #[test]
    fn reads_file_from_bundle_root() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join(SETTINGS_FILE), "[tracing]\nmode = \"off\"\n")
            .expect("write settings");
        let loader = SettingsLoader::load_or_default(dir.path()).expect("settings");
        assert_eq!(loader.settings().tracing.mode, TracingMode::Off);
    }

    #[test]
    fn unreadable_file_reports_cause_once() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        fs::create_dir(&path).expect("directory in place of file");
        let err = SettingsLoader::from_path(&path).err().expect("read error");
        assert!(matches!(err, SettingsError::Read { .. }));
        let cause = std::error::Error::source(&err).expect("io cause").to_string();
        let rendered = format!("{:#}", anyhow::Error::new(err));
        assert!(rendered.contains(SETTINGS_FILE));
        assert_eq!(rendered.matches(cause.as_str()).count(), 1);
    }

    #[test]
    fn level_converts_to_filter() {
        assert_eq!(LevelFilter::from(LogLevel::Warn), LevelFilter::WARN);
        assert_eq!(LevelFilter::from(LogLevel::Off), LevelFilter::OFF);
    }
}
