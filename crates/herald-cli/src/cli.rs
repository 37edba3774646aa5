use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "herald",
    about = "Herald — long-polling notification server",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the notification server
    Serve(ServeArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Override the listen address
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Do not start the background notification producer
    #[arg(long)]
    pub no_producer: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Path to a TOML configuration file to validate and print
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from(["herald", "serve"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert!(args.config.is_none());
            assert!(args.bind.is_none());
            assert!(!args.no_producer);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_serve_overrides() {
        let cli = Cli::try_parse_from([
            "herald", "serve", "--config", "herald.toml", "--bind", "0.0.0.0:8080", "--no-producer",
        ])
        .unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.config, Some(PathBuf::from("herald.toml")));
            assert_eq!(args.bind, Some("0.0.0.0:8080".parse().unwrap()));
            assert!(args.no_producer);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_serve_rejects_bad_bind() {
        assert!(Cli::try_parse_from(["herald", "serve", "--bind", "not-an-addr"]).is_err());
    }

    #[test]
    fn parse_config() {
        let cli = Cli::try_parse_from(["herald", "config"]).unwrap();
        assert!(matches!(cli.command, Command::Config(_)));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["herald", "--verbose", "serve"]).unwrap();
        assert!(cli.verbose);
    }
}
