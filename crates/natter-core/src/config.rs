use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer as concisely as possible.";

/// One extra credential a plugin endpoint requires in the request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginKey {
    pub key: String,
    pub value: String,
}

/// An alternate non-streaming reply provider. Requests to its endpoint
/// carry the plugin's credential fields and return a single complete
/// `{answer}` object instead of a chunked stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub required_keys: Vec<PluginKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// Directory holding persisted store snapshots.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default)]
    pub plugins: Vec<Plugin>,

    #[serde(default)]
    pub debug: bool,
}

fn default_working_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_data_dir() -> String {
    ".natter".into()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_temperature() -> f32 {
    1.0
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            data_dir: default_data_dir(),
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
            plugins: Vec::new(),
            debug: false,
        }
    }
}

impl AppConfig {
    pub fn data_path(&self) -> PathBuf {
        self.working_dir.join(&self.data_dir)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|k| !k.is_empty())
    }

    pub fn plugin(&self, id: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.id == id)
    }
}

/// Layered load: defaults, then the global config file, then a local
/// `natter.json` in the working directory, then environment variables.
pub fn load_config(working_dir: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let wd = working_dir.unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    let mut config = AppConfig::default();
    config.working_dir = wd.clone();

    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("natter").join("config.json");
        if global_path.exists() {
            let content = std::fs::read_to_string(&global_path)
                .map_err(|e| ConfigError::File(e.to_string()))?;
            let file_config: AppConfig = serde_json::from_str(&content)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            merge_config(&mut config, file_config);
        }
    }

    let local_path = wd.join("natter.json");
    if local_path.exists() {
        let content = std::fs::read_to_string(&local_path)
            .map_err(|e| ConfigError::File(e.to_string()))?;
        let file_config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        merge_config(&mut config, file_config);
    }

    detect_api_key(&mut config);

    Ok(config)
}

fn merge_config(base: &mut AppConfig, overlay: AppConfig) {
    if overlay.api_key.is_some() {
        base.api_key = overlay.api_key;
    }
    if overlay.endpoint != default_endpoint() {
        base.endpoint = overlay.endpoint;
    }
    if overlay.model != default_model() {
        base.model = overlay.model;
    }
    if (overlay.temperature - default_temperature()).abs() > f32::EPSILON {
        base.temperature = overlay.temperature;
    }
    if overlay.system_prompt != default_system_prompt() {
        base.system_prompt = overlay.system_prompt;
    }
    if overlay.data_dir != default_data_dir() {
        base.data_dir = overlay.data_dir;
    }
    if !overlay.plugins.is_empty() {
        base.plugins = overlay.plugins;
    }
    if overlay.debug {
        base.debug = true;
    }
}

fn detect_api_key(config: &mut AppConfig) {
    if config.has_api_key() {
        return;
    }
    for env_var in ["NATTER_API_KEY", "OPENAI_API_KEY"] {
        if let Ok(key) = std::env::var(env_var) {
            if !key.is_empty() {
                config.api_key = Some(key);
                return;
            }
        }
    }
}
