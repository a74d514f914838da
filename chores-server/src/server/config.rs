use chores_shared::auth::Role;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, fs};

pub const DEFAULT_LISTEN_PORT: u16 = 5151;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub users: Vec<UserConfig>,
    pub listen_port: Option<u16>,
    /// IANA zone name; "today" is computed in this zone.
    pub timezone: Option<String>,
    pub static_dir: Option<PathBuf>,
    pub dev_cors_origin: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub username: String,
    pub password_hash: String, // bcrypt hash
    pub role: Role,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unknown timezone: {0}")]
    Timezone(String),
}

impl AppConfig {
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(&path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = serde_yaml::from_str(text)?;
        // Fail at startup rather than on the first request.
        cfg.tz()?;
        Ok(cfg)
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        match self.timezone.as_deref().map(str::trim) {
            None | Some("") => Ok(Tz::UTC),
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ConfigError::Timezone(name.to_string())),
        }
    }

    /// `PORT` overrides `listen_port`.
    pub fn port(&self) -> u16 {
        env::var("PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .or(self.listen_port)
            .unwrap_or(DEFAULT_LISTEN_PORT)
    }

    pub fn user(&self, username: &str) -> Option<&UserConfig> {
        self.users.iter().find(|u| u.username == username)
    }
}
