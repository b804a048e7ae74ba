use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const SETTINGS_FILE: &str = "settings.json";

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("USERPROFILE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Values a user may keep in `settings.json`. Every field is optional so the
/// file only needs to hold overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    price_per_1k_tokens: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    export_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub price_per_1k_tokens: Decimal,
    pub request_timeout_secs: u64,
    pub data_dir: PathBuf,
    pub export_dir: PathBuf,
}

impl AppConfig {
    pub fn defaults(data_dir: PathBuf, workspace: &Path) -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            price_per_1k_tokens: Decimal::new(2, 3),
            request_timeout_secs: 120,
            data_dir,
            export_dir: workspace.join("pagesmith-export"),
        }
    }

    /// Defaults, then `settings.json` in the data directory, then environment
    /// variables. Problems with the settings file are returned as warnings.
    pub fn load(workspace: &Path) -> (Self, Vec<String>) {
        let data_dir = std::env::var_os("PAGESMITH_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home_dir().join(".pagesmith"));
        let mut config = Self::defaults(data_dir, workspace);
        let mut warnings = Vec::new();

        match read_settings(&config.settings_path()) {
            Ok(Some(settings)) => config.apply_settings(settings),
            Ok(None) => {}
            Err(err) => warnings.push(err),
        }
        config.apply_env(|key| std::env::var(key).ok(), &mut warnings);

        (config, warnings)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    fn apply_settings(&mut self, settings: SettingsFile) {
        if let Some(api_key) = settings.api_key.filter(|key| !key.trim().is_empty()) {
            self.api_key = Some(api_key);
        }
        if let Some(base_url) = settings.base_url {
            self.base_url = base_url;
        }
        if let Some(model) = settings.model {
            self.model = model;
        }
        if let Some(price) = settings.price_per_1k_tokens {
            self.price_per_1k_tokens = price;
        }
        if let Some(timeout) = settings.request_timeout_secs {
            self.request_timeout_secs = timeout;
        }
        if let Some(export_dir) = settings.export_dir {
            self.export_dir = export_dir;
        }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>, warnings: &mut Vec<String>) {
        if let Some(api_key) = var("OPENAI_API_KEY").filter(|key| !key.trim().is_empty()) {
            self.api_key = Some(api_key);
        }
        if let Some(base_url) = var("OPENAI_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(model) = var("PAGESMITH_MODEL") {
            self.model = model;
        }
        if let Some(raw) = var("PAGESMITH_PRICE_PER_1K") {
            match Decimal::from_str(raw.trim()) {
                Ok(price) if !price.is_sign_negative() => self.price_per_1k_tokens = price,
                _ => warnings.push(format!("ignoring invalid PAGESMITH_PRICE_PER_1K: {raw}")),
            }
        }
    }

    /// Stores a verified key in `settings.json`, keeping the other entries.
    pub fn save_api_key(&mut self, api_key: &str) -> io::Result<()> {
        let path = self.settings_path();
        let mut settings = read_settings(&path)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?
            .unwrap_or_default();
        settings.api_key = Some(api_key.to_string());

        self.write_settings(&settings)?;
        self.api_key = Some(api_key.to_string());
        tracing::info!(path = %path.display(), "api key saved");
        Ok(())
    }

    /// Drops a rejected key. It is removed from `settings.json` only when the
    /// file holds that same key; a key from the environment leaves the file
    /// alone. Returns whether the file changed.
    pub fn forget_api_key(&mut self, api_key: &str) -> io::Result<bool> {
        if self.api_key.as_deref() == Some(api_key) {
            self.api_key = None;
        }

        let path = self.settings_path();
        let Some(mut settings) =
            read_settings(&path).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?
        else {
            return Ok(false);
        };
        if settings.api_key.as_deref() != Some(api_key) {
            return Ok(false);
        }

        settings.api_key = None;
        self.write_settings(&settings)?;
        tracing::info!(path = %path.display(), "rejected api key removed");
        Ok(true)
    }

    fn write_settings(&self, settings: &SettingsFile) -> io::Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        let bytes = serde_json::to_vec_pretty(settings)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
        fs::write(self.settings_path(), bytes)
    }
}

fn read_settings(path: &Path) -> Result<Option<SettingsFile>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read(path).map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|err| format!("failed to parse {}: {err}", path.display()))
}
