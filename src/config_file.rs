use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{parse_timeout, ErrorStrategy};

pub const PROJECT_CONFIG_NAME: &str = ".streetfinesrc";

/// Pipeline defaults read from an INI file's `[pipeline]` section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub buffer_size: Option<usize>,
    pub threads: Option<usize>,
    pub batch_size: Option<usize>,
    pub shutdown_timeout: Option<Duration>,
    pub on_error: Option<ErrorStrategy>,
}

impl ConfigFile {
    /// Find project-level .streetfinesrc by walking up directory tree
    pub fn find_project_config() -> Option<PathBuf> {
        let mut current = env::current_dir().ok()?;
        loop {
            let config_path = current.join(PROJECT_CONFIG_NAME);
            if config_path.exists() {
                return Some(config_path);
            }
            if !current.pop() {
                break;
            }
        }
        None
    }

    /// User config locations in order of preference
    pub fn get_user_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if cfg!(windows) {
            if let Ok(appdata) = env::var("APPDATA") {
                paths.push(PathBuf::from(appdata).join("streetfines").join("config.ini"));
            }
        } else {
            let xdg_config = env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    env::var("HOME")
                        .map(|h| PathBuf::from(h).join(".config"))
                        .unwrap_or_else(|_| PathBuf::from(".config"))
                });
            paths.push(xdg_config.join("streetfines").join("config.ini"));
        }

        paths
    }

    /// Load with precedence: project file > user file > nothing
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::get_user_config_paths()
            .into_iter()
            .find(|p| p.exists())
        {
            config = Self::merge_configs(config, Self::load_from_path(&path)?);
        }

        if let Some(project_path) = Self::find_project_config() {
            config = Self::merge_configs(config, Self::load_from_path(&project_path)?);
        }

        Ok(config)
    }

    /// An explicit `--config-file` replaces the search entirely.
    pub fn load_with_custom_path(custom_path: Option<&str>) -> Result<Self> {
        match custom_path {
            Some(path) => Self::load_from_path(Path::new(path)),
            None => Self::load(),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse_ini_content(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    fn parse_ini_content(content: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut current_section = String::new();

        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                current_section = line[1..line.len() - 1].trim().to_string();
                continue;
            }

            let Some(eq_pos) = line.find('=') else {
                return Err(anyhow!("line {}: expected key = value", idx + 1));
            };
            if current_section != "pipeline" {
                // Unknown sections are ignored.
                continue;
            }

            let key = line[..eq_pos].trim();
            let value = line[eq_pos + 1..].trim();
            let context = || format!("line {}: bad value for {}", idx + 1, key);
            match key {
                "buffer_size" => config.buffer_size = Some(value.parse().with_context(context)?),
                "threads" => config.threads = Some(value.parse().with_context(context)?),
                "batch_size" => config.batch_size = Some(value.parse().with_context(context)?),
                "shutdown_timeout" => {
                    config.shutdown_timeout =
                        Some(parse_timeout(value).map_err(|e| anyhow!(e)).with_context(context)?)
                }
                "on_error" => {
                    config.on_error = Some(
                        ErrorStrategy::from_str(value, true)
                            .map_err(|e| anyhow!(e))
                            .with_context(context)?,
                    )
                }
                _ => log::warn!("ignoring unknown config key '{}'", key),
            }
        }

        Ok(config)
    }

    /// Merge two configs, the second taking precedence
    fn merge_configs(base: Self, overlay: Self) -> Self {
        Self {
            buffer_size: overlay.buffer_size.or(base.buffer_size),
            threads: overlay.threads.or(base.threads),
            batch_size: overlay.batch_size.or(base.batch_size),
            shutdown_timeout: overlay.shutdown_timeout.or(base.shutdown_timeout),
            on_error: overlay.on_error.or(base.on_error),
        }
    }
}
