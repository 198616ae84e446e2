use clap::{ArgAction, Args, Parser, Subcommand};
use seamcheck_core::ReportFormat;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "seamcheck", version, about = "Consistency checks for clothing predictions")]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "Increase log verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a prediction batch and report which items are consistent
    Check(CheckArgs),
    /// Merge category and attribute model outputs into one prediction batch
    Combine {
        /// Category classifier output: {key: class_index}
        global: PathBuf,
        /// Attribute model output: {key: {body_part, weather_type, edge_shape}}
        props: PathBuf,
        #[arg(short, long, help = "Write the batch here instead of stdout")]
        output: Option<PathBuf>,
    },
    /// Print the standard taxonomy
    Schema {
        #[arg(long, help = "Print the property index as JSON instead of formulas")]
        index: bool,
    },
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Prediction batch (record array or object keyed by image id)
    pub input: PathBuf,
    #[arg(short, long, help = "Runtime config (YAML)")]
    pub config: Option<PathBuf>,
    #[arg(short, long, help = "Write the report here instead of stdout")]
    pub output: Option<PathBuf>,
    #[arg(short, long, help = "Report format: text or json")]
    pub format: Option<ReportFormat>,
    #[arg(long, help = "Write evicted item ids (JSON) here")]
    pub evicted: Option<PathBuf>,
    #[arg(long, help = "Number of check workers")]
    pub workers: Option<usize>,
    #[arg(long, help = "Number of store shards")]
    pub shards: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_args() {
        let cli = Cli::try_parse_from([
            "seamcheck",
            "-vv",
            "check",
            "preds.json",
            "--format",
            "json",
            "--workers",
            "2",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.input, PathBuf::from("preds.json"));
                assert_eq!(args.format, Some(ReportFormat::Json));
                assert_eq!(args.workers, Some(2));
                assert!(args.output.is_none());
            }
            other => panic!("expected check, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_format_rejected() {
        let result = Cli::try_parse_from(["seamcheck", "check", "p.json", "--format", "xml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_schema_index_flag() {
        let cli = Cli::try_parse_from(["seamcheck", "schema", "--index"]).unwrap();
        assert!(matches!(cli.command, Commands::Schema { index: true }));
    }
}
