//! # Configuration
//!
//! Resolution order, lowest to highest: built-in defaults, `epsim.toml`,
//! environment variables, CLI flags (applied by the caller).
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [storage]
//! database = "epsim.redb"
//! backend = "redb"          # or "file"
//!
//! [audio]
//! directory = "recordings"
//! max_bytes = 52428800
//! language = "en"
//!
//! [transcription]
//! provider = "disabled"     # or "whisper"
//! endpoint = "https://api.openai.com/v1/audio/transcriptions"
//! model = "whisper-1"
//! timeout_secs = 60
//! ```
//!
//! Security settings (`EPSIM_API_KEY`, `EPSIM_CORS_ORIGINS`,
//! `EPSIM_RATE_LIMIT`) are read from the environment only.

use epsim_core::EpsimError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "epsim.toml";

/// Upper bound for the config file itself.
const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Where records live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database: PathBuf,
    pub backend: Backend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("epsim.redb"),
            backend: Backend::Redb,
        }
    }
}

/// Storage backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// ACID redb database.
    #[default]
    Redb,
    /// In-memory registry saved as a snapshot file.
    File,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redb => "redb",
            Self::File => "file",
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = EpsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redb" => Ok(Self::Redb),
            "file" => Ok(Self::File),
            other => Err(EpsimError::InvalidInput(format!(
                "Unknown backend '{}'. Use: redb, file",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Root that recording paths are resolved against. `None` disables
    /// analysis.
    pub directory: Option<PathBuf>,
    pub max_bytes: u64,
    pub language: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            directory: None,
            max_bytes: 50 * 1024 * 1024,
            language: "en".to_string(),
        }
    }
}

/// Speech-to-text backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Disabled,
    /// OpenAI-compatible `/v1/audio/transcriptions`.
    Whisper,
}

impl std::str::FromStr for Provider {
    type Err = EpsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "none" | "" => Ok(Self::Disabled),
            "whisper" => Ok(Self::Whisper),
            other => Err(EpsimError::InvalidInput(format!(
                "Unknown transcription provider '{}'. Use: disabled, whisper",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub provider: Provider,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Disabled,
            endpoint: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            model: "whisper-1".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

// =============================================================================
// APP CONFIG
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub audio: AudioConfig,
    pub transcription: TranscriptionConfig,
}

impl AppConfig {
    /// Load the file (if any) and apply environment overrides.
    ///
    /// An explicit path, or one named by `EPSIM_CONFIG`, must exist.
    /// The default `epsim.toml` is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, EpsimError> {
        let from_env = std::env::var("EPSIM_CONFIG").ok().map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, EpsimError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            EpsimError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_SIZE {
            return Err(EpsimError::InvalidInput(format!(
                "Config file exceeds {} bytes",
                MAX_CONFIG_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            EpsimError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, EpsimError> {
        toml::from_str(text)
            .map_err(|e| EpsimError::DeserializationError(format!("Parse config: {}", e)))
    }

    /// Apply `EPSIM_*` overrides from `lookup`. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), EpsimError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("EPSIM_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("EPSIM_PORT") {
            self.server.port = port.trim().parse().map_err(|_| {
                EpsimError::InvalidInput(format!("EPSIM_PORT is not a port: {}", port))
            })?;
        }
        if let Some(database) = get("EPSIM_DATABASE") {
            self.storage.database = PathBuf::from(database);
        }
        if let Some(backend) = get("EPSIM_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(dir) = get("EPSIM_AUDIO_DIR") {
            self.audio.directory = Some(PathBuf::from(dir));
        }
        if let Some(provider) = get("EPSIM_TRANSCRIPTION") {
            self.transcription.provider = provider.parse()?;
        }
        if let Some(url) = get("EPSIM_WHISPER_URL") {
            self.transcription.endpoint = url;
        }
        if let Some(key) = get("EPSIM_WHISPER_KEY") {
            self.transcription.api_key = Some(key);
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").expect("parse");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, Backend::Redb);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 9000

            [storage]
            backend = "file"

            [transcription]
            provider = "whisper"
            "#,
        )
        .expect("parse");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.backend, Backend::File);
        assert_eq!(config.transcription.provider, Provider::Whisper);
        assert_eq!(config.transcription.model, "whisper-1");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let result = AppConfig::from_toml("[storage]\nbackend = \"sqlite\"\n");
        assert!(matches!(result, Err(EpsimError::DeserializationError(_))));
    }

    #[test]
    fn env_overrides_file() {
        let mut config = AppConfig::from_toml("[server]\nport = 9000\n").expect("parse");
        config
            .apply_overrides(env(&[
                ("EPSIM_PORT", "9100"),
                ("EPSIM_BACKEND", "file"),
                ("EPSIM_AUDIO_DIR", "/srv/audio"),
                ("EPSIM_WHISPER_KEY", "sk-test"),
            ]))
            .expect("overrides");
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.storage.backend, Backend::File);
        assert_eq!(config.audio.directory, Some(PathBuf::from("/srv/audio")));
        assert_eq!(config.transcription.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[("EPSIM_HOST", "  ")]))
            .expect("overrides");
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn bad_port_is_an_error() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(env(&[("EPSIM_PORT", "eighty")]));
        assert!(matches!(result, Err(EpsimError::InvalidInput(_))));
    }

    #[test]
    fn config_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("epsim.toml");
        std::fs::write(&path, "[audio]\nlanguage = \"fr\"\nmax_bytes = 1024\n").expect("write");
        let config = AppConfig::from_file(&path).expect("load");
        assert_eq!(config.audio.language, "fr");
        assert_eq!(config.audio.max_bytes, 1024);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = AppConfig::from_file(Path::new("/nonexistent/epsim.toml"));
        assert!(matches!(result, Err(EpsimError::IoError(_))));
    }
}
