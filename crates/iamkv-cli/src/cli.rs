use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::BackendKind;

#[derive(Parser)]
#[command(
    name = "iamkv",
    about = "iamkv: a key-value store hidden in access-control policies",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the backend named in the configuration file
    #[arg(long, global = true)]
    pub backend: Option<BackendKind>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a value under a key
    Set(SetArgs),
    /// Print the value stored under a key
    Get(GetArgs),
    /// Remove a key and its holders
    Delete(DeleteArgs),
    /// Estimate used and available capacity
    Usage,
    /// Run the end-to-end demonstration
    Demo,
}

#[derive(Args)]
pub struct SetArgs {
    pub key: String,
    /// Value to store; read from --file or stdin when omitted
    pub value: Option<String>,
    #[arg(long, conflicts_with = "value")]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct GetArgs {
    pub key: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_set_with_inline_value() {
        let cli = Cli::try_parse_from(["iamkv", "set", "k1", "cats-are-cool"]).unwrap();
        match cli.command {
            Command::Set(args) => {
                assert_eq!(args.key, "k1");
                assert_eq!(args.value.as_deref(), Some("cats-are-cool"));
                assert!(args.file.is_none());
            }
            _ => panic!("expected set"),
        }
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn value_and_file_conflict() {
        let res = Cli::try_parse_from(["iamkv", "set", "k", "v", "--file", "value.txt"]);
        assert!(res.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "iamkv", "get", "k", "--format", "json", "--backend", "memory", "-c", "kv.toml",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.backend, Some(BackendKind::Memory));
        assert_eq!(cli.config, Some(PathBuf::from("kv.toml")));
    }

    #[test]
    fn usage_and_demo_take_no_arguments() {
        assert!(matches!(
            Cli::try_parse_from(["iamkv", "usage"]).unwrap().command,
            Command::Usage
        ));
        assert!(matches!(
            Cli::try_parse_from(["iamkv", "demo", "-v"]).unwrap().command,
            Command::Demo
        ));
    }
}
