//! Loading of the framework build manifest and construction of the server options.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Build output directory, relative to the bundle root.
pub const BUILD_DIR: &str = ".next";
/// Manifest the framework build writes for standalone servers.
pub const REQUIRED_SERVER_FILES: &str = "required-server-files.json";

const COMPRESS_KEY: &str = "compress";
const BASE_PATH_KEY: &str = "basePath";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse {}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Opaque framework configuration object as emitted by the framework build.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FrameworkConfig(Map<String, Value>);

impl FrameworkConfig {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether the framework compresses responses itself. Missing means enabled.
    pub fn compress(&self) -> bool {
        self.0
            .get(COMPRESS_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    pub fn base_path(&self) -> Option<&str> {
        self.0
            .get(BASE_PATH_KEY)
            .and_then(Value::as_str)
            .filter(|path| !path.is_empty())
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn without_compression(mut self) -> Self {
        self.0.insert(COMPRESS_KEY.to_string(), Value::Bool(false));
        self
    }
}

/// Contents of `.next/required-server-files.json`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredServerFiles {
    pub version: u32,
    pub config: FrameworkConfig,
    #[serde(default)]
    pub app_dir: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl RequiredServerFiles {
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }
}

/// Options the framework server is constructed from.
///
/// Built once at startup. Compression is always disabled in `conf`: the invocation envelope carries
/// the body verbatim and binary bodies are base64 encoded by the shim instead.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    conf: FrameworkConfig,
    custom_server: bool,
    dev: bool,
    dir: PathBuf,
    minimal_mode: bool,
}

impl ServerConfig {
    /// Path of the manifest for the given bundle root.
    pub fn manifest_path(bundle_root: &Path) -> PathBuf {
        bundle_root.join(BUILD_DIR).join(REQUIRED_SERVER_FILES)
    }

    /// Read and merge the bundled manifest. Failures here are fatal for the process.
    pub fn load(bundle_root: &Path) -> Result<Self, ConfigError> {
        let path = Self::manifest_path(bundle_root);
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let files = RequiredServerFiles::parse(&contents)
            .map_err(|source| ConfigError::Parse { path, source })?;

        tracing::debug!(
            "loaded framework manifest version={} files={}",
            files.version,
            files.files.len()
        );

        Ok(Self::from_required_files(files, bundle_root.to_path_buf()))
    }

    pub fn from_required_files(files: RequiredServerFiles, dir: PathBuf) -> Self {
        Self {
            conf: files.config.without_compression(),
            custom_server: false,
            dev: false,
            dir,
            minimal_mode: true,
        }
    }

    pub fn conf(&self) -> &FrameworkConfig {
        &self.conf
    }

    pub fn custom_server(&self) -> bool {
        self.custom_server
    }

    pub fn dev(&self) -> bool {
        self.dev
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn minimal_mode(&self) -> bool {
        self.minimal_mode
    }
}
