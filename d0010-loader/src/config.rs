use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

const DEFAULT_CONFIG_PATH: &str = "d0010-config.toml";

/// Five bind parameters per reading under the Postgres limit of 65535.
pub const MAX_BATCH_SIZE: usize = 13_000;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// File extension (without the dot) accepted as D0010 input.
    pub extension: String,
    pub batch_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extension: "uff".to_string(),
            batch_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub loader: LoaderConfig,
}

fn default_max_connections() -> u32 {
    2
}

impl AppConfig {
    /// Load from `path`, then `D0010_CONFIG`, then `d0010-config.toml`.
    ///
    /// An explicitly named file must exist; the default file is optional.
    /// `D0010_DATABASE_URL` overrides `database.uri`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os("D0010_CONFIG").map(PathBuf::from));

        let mut cfg = match explicit {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };

        if let Ok(uri) = env::var("D0010_DATABASE_URL") {
            match cfg.database.as_mut() {
                Some(db) => db.uri = uri,
                None => {
                    cfg.database = Some(DatabaseConfig {
                        uri,
                        max_connections: default_max_connections(),
                    })
                }
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", path.display()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let batch_size = self.loader.batch_size;
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            anyhow::bail!("loader.batch_size must be between 1 and {MAX_BATCH_SIZE}, got {batch_size}");
        }
        let ext = &self.loader.extension;
        if ext.is_empty() || ext.starts_with('.') {
            anyhow::bail!("loader.extension must be a bare extension such as \"uff\", got {ext:?}");
        }
        Ok(())
    }
}
