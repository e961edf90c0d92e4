use std::fs;
use std::path::Path;

use engine_logging::{engine_info, engine_warn};
use serde::{Deserialize, Serialize};

use crate::fetch::ResolveSettings;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformerSettings {
    /// Hosts whose feeds take the rich platform path; subdomains match too.
    pub rich_platform_hosts: Vec<String>,
    /// Host a media redirect must land on to count as a gist.
    pub gist_host: String,
    pub resolve: ResolveSettings,
}

impl Default for TransformerSettings {
    fn default() -> Self {
        Self {
            rich_platform_hosts: vec!["medium.com".to_string()],
            gist_host: "gist.github.com".to_string(),
            resolve: ResolveSettings::default(),
        }
    }
}

impl TransformerSettings {
    pub fn from_ron_str(content: &str) -> Result<Self, SettingsError> {
        Ok(ron::from_str(content)?)
    }

    /// Reads settings from `path`, falling back to defaults if the file is
    /// missing or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Self::default();
            }
            Err(err) => {
                engine_warn!("Failed to read transformer settings from {:?}: {}", path, err);
                return Self::default();
            }
        };

        match Self::from_ron_str(&content) {
            Ok(settings) => {
                engine_info!("Loaded transformer settings from {:?}", path);
                settings
            }
            Err(err) => {
                engine_warn!("Failed to parse transformer settings from {:?}: {}", path, err);
                Self::default()
            }
        }
    }
}
