//! Config command - inspect or initialize the configuration file

use cloak_node_core::args::DataDirArgs;
use cloak_node_core::config::CloakConfig;
use eyre::Result;
use tracing::info;

use crate::cli::ConfigArgs;

pub(crate) fn run(datadir: &DataDirArgs, args: ConfigArgs) -> Result<()> {
    let path = datadir.config_file();

    let mut config = if args.init {
        let existed = path.exists();
        let config = CloakConfig::load_or_create(&path)?;
        if existed {
            info!(path = %path.display(), "configuration already exists");
        } else {
            info!(path = %path.display(), "wrote default configuration");
        }
        config
    } else {
        CloakConfig::load(Some(&path))?
    };

    if args.show {
        config.apply_args(&args.network);
        println!("# {}\n{}", path.display(), config.to_toml()?);
    }

    Ok(())
}
