use anyhow::Result;
use clap::{ArgAction, builder::PossibleValuesParser, value_parser};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Debug, Clone)]
pub struct AppArgs {
    pub config_file: String,
    pub config_test: bool,
    pub report: bool,
    pub log_level: String,
}

fn command() -> clap::Command {
    clap::Command::new("streamcopy-rs")
        .version(crate::VERSION)
        .arg(
            clap::Arg::new("config")
                .short('c')
                .long("config")
                .help("Config filename")
                .default_value("config.yaml")
                .value_parser(value_parser!(String))
                .num_args(1),
        )
        .arg(
            clap::Arg::new("log-level")
                .short('l')
                .long("log")
                .help("Set log level")
                .value_parser(PossibleValuesParser::new([
                    "error", "warn", "info", "debug", "trace",
                ]))
                .num_args(1),
        )
        .arg(
            clap::Arg::new("config-check")
                .short('t')
                .long("test")
                .action(ArgAction::SetTrue)
                .help("Load and check config file then exits"),
        )
        .arg(
            clap::Arg::new("report")
                .long("report")
                .action(ArgAction::SetTrue)
                .help("Print session statistics as JSON when done"),
        )
}

fn args_from(matches: &clap::ArgMatches) -> AppArgs {
    let config_file = matches
        .get_one("config")
        .map(String::as_str)
        .unwrap_or("config.yaml")
        .to_string();
    let log_level = matches
        .get_one("log-level")
        .map(String::as_str)
        .unwrap_or("info")
        .to_string();
    AppArgs {
        config_file,
        config_test: matches.get_flag("config-check"),
        report: matches.get_flag("report"),
        log_level,
    }
}

pub fn parse_args() -> Result<AppArgs> {
    let args = args_from(&command().get_matches());
    init_logging(&args.log_level)?;
    Ok(args)
}

pub fn init_logging(log_level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.parse()?)
                .from_env()?,
        )
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args_default() {
        let matches = command().get_matches_from(["streamcopy-rs"]);
        let args = args_from(&matches);

        assert_eq!(args.config_file, "config.yaml");
        assert!(!args.config_test);
        assert!(!args.report);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_parse_args_flags() {
        let matches = command().get_matches_from([
            "streamcopy-rs",
            "-c",
            "copy.yaml",
            "-l",
            "debug",
            "-t",
            "--report",
        ]);
        let args = args_from(&matches);

        assert_eq!(args.config_file, "copy.yaml");
        assert!(args.config_test);
        assert!(args.report);
        assert_eq!(args.log_level, "debug");
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let ret = command().try_get_matches_from(["streamcopy-rs", "-l", "loud"]);
        assert!(ret.is_err());
    }

    #[test]
    fn test_init_logging_valid_levels() {
        // init_logging can only run once per process, check the directives parse
        for level in ["error", "warn", "info", "debug", "trace"] {
            assert!(level.parse::<tracing::Level>().is_ok());
        }
    }
}
