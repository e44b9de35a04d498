use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::tag::{Credentials, ModuleLocation, TagSpec};
use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

/// Run configuration: templates, credentials, modules and tool paths.
#[derive(Debug, Clone)]
pub struct Config {
    /// Templates and flags shared across all modules of a run
    pub spec: TagSpec,
    /// Repository credentials; tagging refuses to start without them
    pub credentials: Option<Credentials>,
    /// Path to the `svn` binary
    pub svn_path: PathBuf,
    /// Modules to tag, in build-configuration order
    pub modules: Vec<ModuleLocation>,
    /// Extra variables exposed to templates as `sys['NAME']`
    pub system_properties: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spec: TagSpec::default(),
            credentials: None,
            svn_path: PathBuf::from("svn"),
            modules: Vec::new(),
            system_properties: HashMap::new(),
        }
    }
}

/// TOML representation of template configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlTemplates {
    pub tag_base_url: Option<String>,
    pub tag_comment: Option<String>,
    pub tag_delete_comment: Option<String>,
}

/// TOML representation of run flags
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlRunConfig {
    pub peg_externals: Option<bool>,
    /// Pause between deleting the old tags and committing the new ones
    pub wait_secs: Option<u64>,
    pub svn_path: Option<PathBuf>,
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub templates: Option<TomlTemplates>,
    pub auth: Option<Credentials>,
    pub run: Option<TomlRunConfig>,
    pub sys: Option<HashMap<String, String>>,
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleLocation>,
}

impl Config {
    /// Load configuration from the default location, merging with
    /// defaults. Creates an example config on first run.
    pub fn load() -> Self {
        let config_file = config_path();

        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        Self::load_from(&config_file)
    }

    /// Load configuration from a specific file, merging with defaults.
    /// A missing or unparsable file yields the defaults.
    pub fn load_from(config_file: &Path) -> Self {
        let mut config = Config::default();

        if config_file.exists() {
            if let Ok(contents) = fs::read_to_string(config_file) {
                match toml::from_str::<TomlConfig>(&contents) {
                    Ok(toml_config) => config.merge(toml_config),
                    Err(error) => {
                        tracing::warn!(
                            path = %config_file.display(),
                            error = %error,
                            "Failed to parse config file, using defaults"
                        );
                    }
                }
            }
        }

        config
    }

    /// Apply the optional fields of a parsed TOML config on top of the
    /// current values.
    pub fn merge(&mut self, toml_config: TomlConfig) {
        if let Some(templates) = toml_config.templates {
            if let Some(tag_base_url) = templates.tag_base_url {
                self.spec.tag_base_url = tag_base_url;
            }
            if let Some(tag_comment) = templates.tag_comment {
                self.spec.tag_comment = tag_comment;
            }
            if let Some(tag_delete_comment) = templates.tag_delete_comment {
                self.spec.tag_delete_comment = tag_delete_comment;
            }
        }

        if let Some(run) = toml_config.run {
            if let Some(peg_externals) = run.peg_externals {
                self.spec.peg_externals = peg_externals;
            }
            if let Some(wait_secs) = run.wait_secs {
                self.spec.wait_before_tagging = match wait_secs {
                    0 => None,
                    secs => Some(Duration::from_secs(secs)),
                };
            }
            if let Some(svn_path) = run.svn_path {
                self.svn_path = svn_path;
            }
        }

        if let Some(auth) = toml_config.auth {
            self.credentials = Some(auth);
        }
        if let Some(sys) = toml_config.sys {
            self.system_properties = sys;
        }
        if !toml_config.modules.is_empty() {
            self.modules = toml_config.modules;
        }
    }

    /// Write the example config for the user to edit on first run.
    fn create_default_config(config_file: &Path) {
        if let Some(parent) = config_file.parent() {
            if let Err(error) = fs::create_dir_all(parent) {
                tracing::warn!(
                    path = %parent.display(),
                    error = %error,
                    "Failed to create config directory"
                );
                return;
            }
        }
        if let Err(error) = fs::write(config_file, EXAMPLE_CONFIG) {
            tracing::warn!(
                path = %config_file.display(),
                error = %error,
                "Failed to write example config"
            );
        }
    }
}
