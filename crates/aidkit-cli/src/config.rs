use aidkit_core::oracle::{DEFAULT_CLOUD_MODEL, DEFAULT_LOCAL_MODEL};
use aidkit_core::voice::{DEFAULT_HISTORY_LIMIT, GuidanceMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

const CONFIG_VERSION: u32 = 2;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("home directory not found; set HOME or AIDKIT_HOME")]
    HomeMissing,
    #[error("config io error: {0}")]
    Io(#[from] io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    /// Family profile read by `prep` when no other path is given.
    pub profile_path: PathBuf,
}

impl ConfigPaths {
    /// `$AIDKIT_HOME`, or `~/.aidkit` when unset.
    pub fn from_home() -> Result<Self, ConfigError> {
        if let Some(base) = std::env::var_os("AIDKIT_HOME").filter(|value| !value.is_empty()) {
            return Ok(Self::from_base(PathBuf::from(base)));
        }
        let home = std::env::var("HOME").map_err(|_| ConfigError::HomeMissing)?;
        Ok(Self::from_base(PathBuf::from(home).join(".aidkit")))
    }

    pub fn from_base(base_dir: PathBuf) -> Self {
        let config_path = base_dir.join("config.toml");
        let profile_path = base_dir.join("profile.toml");
        Self {
            base_dir,
            config_path,
            profile_path,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub oracle: OracleConfig,
    pub prep: PrepConfig,
    pub guide: GuideConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            oracle: OracleConfig::default(),
            prep: PrepConfig::default(),
            guide: GuideConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub active: String,
    pub local: ProviderConfig,
    pub cloud: ProviderConfig,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            active: "cloud".to_string(),
            local: ProviderConfig {
                provider: "ollama".to_string(),
                model: DEFAULT_LOCAL_MODEL.to_string(),
                api_key: String::new(),
                base_url: String::new(),
            },
            cloud: ProviderConfig {
                provider: "openai".to_string(),
                model: DEFAULT_CLOUD_MODEL.to_string(),
                api_key: String::new(),
                base_url: String::new(),
            },
        }
    }
}

impl OracleConfig {
    pub fn active_profile(&self) -> &ProviderConfig {
        self.profile_for_mode(self.active.as_str())
    }

    pub fn active_profile_mut(&mut self) -> &mut ProviderConfig {
        if self.active == "local" {
            &mut self.local
        } else {
            &mut self.cloud
        }
    }

    pub fn profile_for_mode(&self, mode: &str) -> &ProviderConfig {
        if mode == "local" {
            &self.local
        } else {
            &self.cloud
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub provider: String,
    pub model: String,
    pub api_key: String,
    /// Empty means the provider's default endpoint.
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    pub default_family_count: u32,
    /// Empty means `profile.toml` next to the config file.
    pub profile_path: String,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            default_family_count: 1,
            profile_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuideConfig {
    pub history_limit: usize,
    pub initial_mode: String,
    pub ask_steps: bool,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            initial_mode: "conversation".to_string(),
            ask_steps: true,
        }
    }
}

impl Config {
    pub fn load_or_create(paths: &ConfigPaths) -> Result<Self, ConfigError> {
        ensure_dirs(paths)?;
        if paths.config_path.exists() {
            let config = Self::load(paths)?;
            return Ok(config);
        }

        let config = Self::default();
        Self::write(paths, &config)?;
        Ok(config)
    }

    pub fn load(paths: &ConfigPaths) -> Result<Self, ConfigError> {
        ensure_dirs(paths)?;
        let content = fs::read_to_string(&paths.config_path)?;
        let raw: toml::Value = toml::from_str(&content)?;
        let file_version = raw
            .get("version")
            .and_then(|value| value.as_integer())
            .unwrap_or(0) as u32;

        let mut config: Config = toml::from_str(&content)?;
        let mut migrated = false;

        if file_version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
            migrated = true;
        } else if file_version > CONFIG_VERSION {
            warn!(file_version, supported = CONFIG_VERSION, "config version is newer than supported; proceeding");
        }

        warn_if_loose_permissions(&paths.config_path)?;

        if migrated {
            Self::write(paths, &config)?;
        }

        Ok(config)
    }

    pub fn write(paths: &ConfigPaths, config: &Config) -> Result<(), ConfigError> {
        ensure_dirs(paths)?;
        let content = toml::to_string_pretty(config)?;
        write_atomic(&paths.config_path, content.as_bytes())?;
        Ok(())
    }

    pub fn redacted(&self) -> Self {
        let mut redacted = self.clone();
        redact_provider(&mut redacted.oracle.local);
        redact_provider(&mut redacted.oracle.cloud);
        redacted
    }

    /// The profile file `prep` reads members from.
    pub fn profile_path(&self, paths: &ConfigPaths) -> PathBuf {
        match self.prep.profile_path.trim() {
            "" => paths.profile_path.clone(),
            path => expand_home(path),
        }
    }

    pub fn initial_mode(&self) -> GuidanceMode {
        GuidanceMode::parse(&self.guide.initial_mode).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_active("oracle.active", self.oracle.active.as_str())?;
        validate_oracle_profile("oracle.local", &self.oracle.local)?;
        validate_oracle_profile("oracle.cloud", &self.oracle.cloud)?;

        if self.prep.default_family_count == 0 {
            return Err(ConfigError::Validation(
                "prep.default_family_count must be greater than 0".into(),
            ));
        }
        if self.guide.history_limit == 0 {
            return Err(ConfigError::Validation(
                "guide.history_limit must be greater than 0".into(),
            ));
        }
        if GuidanceMode::parse(&self.guide.initial_mode).is_none() {
            return Err(ConfigError::Validation(format!(
                "guide.initial_mode must be conversation or steps (got {})",
                self.guide.initial_mode
            )));
        }

        Ok(())
    }
}

fn ensure_dirs(paths: &ConfigPaths) -> Result<(), ConfigError> {
    fs::create_dir_all(&paths.base_dir)?;
    Ok(())
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ConfigError> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::other("config path missing parent directory"))?;
    let tmp_path = parent.join("config.toml.tmp");
    fs::write(&tmp_path, contents)?;
    set_strict_permissions(&tmp_path)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn set_strict_permissions(path: &Path) -> Result<(), ConfigError> {
    #[cfg(unix)]
    {
        let perm = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perm)?;
    }
    Ok(())
}

fn warn_if_loose_permissions(path: &Path) -> Result<(), ConfigError> {
    #[cfg(unix)]
    {
        let metadata = fs::metadata(path)?;
        let mode = metadata.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            warn!(
                path = %path.display(),
                "config file is group/world readable; set permissions to 0600"
            );
        }
    }
    Ok(())
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

fn validate_active(field: &str, value: &str) -> Result<(), ConfigError> {
    match value {
        "local" | "cloud" => Ok(()),
        other => Err(ConfigError::Validation(format!(
            "{field} must be local or cloud (got {other})"
        ))),
    }
}

// A missing cloud key is not an error: prep falls back to the offline list.
fn validate_oracle_profile(label: &str, profile: &ProviderConfig) -> Result<(), ConfigError> {
    match profile.provider.as_str() {
        "openai" | "ollama" => {}
        other => {
            return Err(ConfigError::Validation(format!(
                "{label}.provider must be openai or ollama (got {other})"
            )));
        }
    }

    if profile.model.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "{label}.model must not be empty"
        )));
    }
    let base_url = profile.base_url.trim();
    if !base_url.is_empty() && !base_url.starts_with("http://") && !base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation(format!(
            "{label}.base_url must start with http:// or https://"
        )));
    }
    Ok(())
}

fn redact_provider(profile: &mut ProviderConfig) {
    if !profile.api_key.trim().is_empty() {
        profile.api_key = "<redacted>".to_string();
    }
}
