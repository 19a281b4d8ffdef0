use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_CORS_ORIGINS: [&str; 3] = [
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:8081",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Log output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Daemon configuration: defaults, then an optional TOML file, then env.
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address the HTTP server binds to.
    pub bind_addr: String,
    /// Directory with `hand/` and `face/` model subdirectories.
    pub model_dir: PathBuf,
    /// Classifier threshold for the hand model.
    pub hand_threshold: f32,
    /// Classifier threshold for the face model.
    pub face_threshold: f32,
    /// Top-label confidence below which responses report the fallback label.
    pub response_floor: f32,
    pub max_upload_mb: u64,
    /// Serve mock predictions when a real model cannot be loaded.
    pub mock_fallback: bool,
    pub cors_origins: Vec<String>,
    /// Generative backend key; `None` keeps composition on templates.
    pub llm_api_key: Option<String>,
    pub llm_endpoint: String,
    pub llm_model: String,
    pub llm_timeout_secs: u64,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            model_dir: PathBuf::from("./models"),
            hand_threshold: 0.7,
            face_threshold: 0.3,
            response_floor: 0.5,
            max_upload_mb: 10,
            mock_fallback: true,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            llm_api_key: None,
            llm_endpoint: "https://api.openai.com".to_string(),
            llm_model: "gpt-3.5-turbo".to_string(),
            llm_timeout_secs: 15,
            log_format: LogFormat::Pretty,
        }
    }
}

/// Keys accepted in the TOML file. All optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    bind_addr: Option<String>,
    model_dir: Option<PathBuf>,
    hand_threshold: Option<f32>,
    face_threshold: Option<f32>,
    response_floor: Option<f32>,
    max_upload_mb: Option<u64>,
    mock_fallback: Option<bool>,
    cors_origins: Option<Vec<String>>,
    llm_api_key: Option<String>,
    llm_endpoint: Option<String>,
    llm_model: Option<String>,
    llm_timeout_secs: Option<u64>,
    log_format: Option<LogFormat>,
}

impl Config {
    /// Load from `HANDMAT_CONFIG` (if set) and `HANDMAT_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("HANDMAT_CONFIG") {
            config.apply_file(Path::new(&path))?;
        }
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        self.apply_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    fn apply_toml(&mut self, text: &str) -> Result<(), toml::de::Error> {
        let file: FileConfig = toml::from_str(text)?;
        if let Some(v) = file.bind_addr {
            self.bind_addr = v;
        }
        if let Some(v) = file.model_dir {
            self.model_dir = v;
        }
        if let Some(v) = file.hand_threshold {
            self.hand_threshold = v;
        }
        if let Some(v) = file.face_threshold {
            self.face_threshold = v;
        }
        if let Some(v) = file.response_floor {
            self.response_floor = v;
        }
        if let Some(v) = file.max_upload_mb {
            self.max_upload_mb = v;
        }
        if let Some(v) = file.mock_fallback {
            self.mock_fallback = v;
        }
        if let Some(v) = file.cors_origins {
            self.cors_origins = v;
        }
        if let Some(v) = file.llm_api_key {
            self.llm_api_key = Some(v);
        }
        if let Some(v) = file.llm_endpoint {
            self.llm_endpoint = v;
        }
        if let Some(v) = file.llm_model {
            self.llm_model = v;
        }
        if let Some(v) = file.llm_timeout_secs {
            self.llm_timeout_secs = v;
        }
        if let Some(v) = file.log_format {
            self.log_format = v;
        }
        Ok(())
    }

    /// Overlay environment values. `lookup` is `std::env::var` outside tests.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("HANDMAT_BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = lookup("HANDMAT_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        self.hand_threshold = parsed(&lookup, "HANDMAT_HAND_THRESHOLD", self.hand_threshold);
        self.face_threshold = parsed(&lookup, "HANDMAT_FACE_THRESHOLD", self.face_threshold);
        self.response_floor = parsed(&lookup, "HANDMAT_RESPONSE_FLOOR", self.response_floor);
        self.max_upload_mb = parsed(&lookup, "HANDMAT_MAX_UPLOAD_MB", self.max_upload_mb);
        if let Some(v) = lookup("HANDMAT_MOCK_FALLBACK") {
            self.mock_fallback = !matches!(v.trim(), "0" | "false" | "no" | "off");
        }
        if let Some(v) = lookup("HANDMAT_CORS_ORIGINS") {
            self.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("OPENAI_API_KEY") {
            self.llm_api_key = Some(v);
        }
        if let Some(v) = lookup("HANDMAT_LLM_ENDPOINT") {
            self.llm_endpoint = v;
        }
        if let Some(v) = lookup("HANDMAT_LLM_MODEL") {
            self.llm_model = v;
        }
        self.llm_timeout_secs = parsed(&lookup, "HANDMAT_LLM_TIMEOUT_SECS", self.llm_timeout_secs);
        match lookup("HANDMAT_LOG_FORMAT").as_deref() {
            Some("json") => self.log_format = LogFormat::Json,
            Some("pretty") => self.log_format = LogFormat::Pretty,
            _ => {}
        }

        // An empty key means "not configured".
        if self.llm_api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            self.llm_api_key = None;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("hand_threshold", self.hand_threshold),
            ("face_threshold", self.face_threshold),
            ("response_floor", self.response_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("{value} is outside [0, 1]"),
                });
            }
        }
        if self.max_upload_mb == 0 {
            return Err(ConfigError::Invalid {
                key: "max_upload_mb",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb as usize).saturating_mul(1024 * 1024)
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
