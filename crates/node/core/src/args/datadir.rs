//! Data directory CLI arguments.

use clap::Args;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the configuration file inside the data directory.
pub const CONFIG_FILE_NAME: &str = "cloak.toml";

/// Data directory configuration.
#[derive(Debug, Args, Clone, Default, Serialize, Deserialize)]
#[command(next_help_heading = "Datadir")]
#[serde(default)]
pub struct DataDirArgs {
    /// Data directory path for all node data.
    #[arg(long, value_name = "PATH", global = true)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datadir: Option<PathBuf>,

    /// Explicit configuration file, overriding `<datadir>/cloak.toml`.
    #[arg(long, value_name = "FILE", global = true)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,
}

impl DataDirArgs {
    /// The data directory, falling back to the platform default and then `.cloak`.
    pub fn root(&self) -> PathBuf {
        self.datadir.clone().unwrap_or_else(|| {
            ProjectDirs::from("org", "cloak", "cloak")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".cloak"))
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| self.root().join(CONFIG_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_resolution() {
        let args = DataDirArgs {
            datadir: Some(PathBuf::from("/tmp/cloak")),
            config: None,
        };
        assert_eq!(args.config_file(), PathBuf::from("/tmp/cloak/cloak.toml"));

        let args = DataDirArgs {
            config: Some(PathBuf::from("/etc/cloak.toml")),
            ..args
        };
        assert_eq!(args.config_file(), PathBuf::from("/etc/cloak.toml"));
    }
}
