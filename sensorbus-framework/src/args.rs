//! CLI argument parsing for SensorBus services.

use std::path::PathBuf;

use clap::Parser;

/// Common CLI arguments for all services.
#[derive(Parser, Debug, Clone)]
#[command(about = "SensorBus service")]
#[command(version)]
pub struct ServiceArgs {
    /// Path to configuration file.
    #[arg(short, long)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl ServiceArgs {
    /// Parse CLI arguments with a default config path.
    ///
    /// If no `--config` argument is provided, uses the default.
    pub fn parse_with_default(default_config: &'static str) -> Self {
        let matches = <Self as clap::CommandFactory>::command()
            .mut_arg("config", |arg| arg.default_value(default_config))
            .get_matches();

        <Self as clap::FromArgMatches>::from_arg_matches(&matches)
            .unwrap_or_else(|e| e.exit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_from_iter() {
        let args = ServiceArgs::try_parse_from([
            "sensorbus-poller",
            "--config",
            "poller.json5",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.config, PathBuf::from("poller.json5"));
        assert_eq!(args.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_config_required() {
        assert!(ServiceArgs::try_parse_from(["sensorbus-poller"]).is_err());
    }
}
