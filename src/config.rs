/// Application configuration
///
/// Settings live in `manager.json` inside the project directory (the git
/// checkout that holds `data.json` and `images/`). Every key is optional.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::media::normalize::NormalizeOptions;

/// Config file name inside the project directory
pub const CONFIG_FILE: &str = "manager.json";

/// Environment variable that overrides the project directory
pub const PROJECT_DIR_ENV: &str = "ADDRESS_MANAGER_HOME";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot determine the project directory: {0}")]
    ProjectDir(std::io::Error),
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Where the publisher reads the access token from
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TokenSource {
    /// File whose trimmed content is the token (relative to the project directory)
    File(PathBuf),
    /// Environment variable holding the token
    Env(String),
}

impl Default for TokenSource {
    fn default() -> Self {
        TokenSource::File(PathBuf::from("github_pat.txt"))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct PublishSettings {
    /// Push URL; `{token}` is replaced by the access token
    pub remote_url: String,
    pub branch: String,
    pub token_source: TokenSource,
    /// Commit message when the caller doesn't supply one
    pub default_message: String,
    pub git_program: PathBuf,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            remote_url: String::new(),
            branch: "main".to_string(),
            token_source: TokenSource::default(),
            default_message: "Update address and photo data".to_string(),
            git_program: PathBuf::from("git"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Address database; defaults to the user data directory
    pub database: Option<PathBuf>,
    pub catalog_file: PathBuf,
    pub images_dir: PathBuf,
    pub publish: PublishSettings,
    pub normalize: NormalizeOptions,
    /// Directory relative paths resolve against; not part of the file
    #[serde(skip)]
    pub project_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            catalog_file: PathBuf::from("data.json"),
            images_dir: PathBuf::from("images"),
            publish: PublishSettings::default(),
            normalize: NormalizeOptions::default(),
            project_dir: PathBuf::new(),
        }
    }
}

impl Config {
    /// Load the config for the project directory named by
    /// `ADDRESS_MANAGER_HOME`, falling back to the current directory.
    pub fn discover() -> Result<Self, ConfigError> {
        let project_dir = match std::env::var_os(PROJECT_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => std::env::current_dir().map_err(ConfigError::ProjectDir)?,
        };
        Self::load(&project_dir)
    }

    /// Load `manager.json` from `project_dir`. A missing file means defaults.
    pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
        let path = project_dir.join(CONFIG_FILE);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str::<Config>(text.trim_start_matches('\u{feff}'))
                .map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No {} found, using defaults", path.display());
                Config::default()
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        config.project_dir = project_dir.to_path_buf();
        Ok(config)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.resolve(&self.catalog_file)
    }

    pub fn images_path(&self) -> PathBuf {
        self.resolve(&self.images_dir)
    }

    /// Address database location.
    ///
    /// The default is stored in the user's data directory:
    /// - Linux: ~/.local/share/address-photo-manager/addresses.db
    /// - macOS: ~/Library/Application Support/address-photo-manager/addresses.db
    /// - Windows: %APPDATA%\address-photo-manager\addresses.db
    pub fn database_path(&self) -> PathBuf {
        match &self.database {
            Some(path) => self.resolve(path),
            None => {
                let mut path = dirs::data_dir()
                    .or_else(dirs::home_dir)
                    .unwrap_or_else(|| self.project_dir.clone());
                path.push("address-photo-manager");
                path.push("addresses.db");
                path
            }
        }
    }

    /// Token source with file paths made absolute
    pub fn token_source(&self) -> TokenSource {
        match &self.publish.token_source {
            TokenSource::File(path) => TokenSource::File(self.resolve(path)),
            other => other.clone(),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }
}
