use anyhow::Context;
use colored::Colorize;

use herald_server::{HeraldConfig, HeraldServer};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Config(args) => cmd_config(args),
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<HeraldConfig> {
    match path {
        Some(path) => HeraldConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(HeraldConfig::default()),
    }
}

fn resolve_serve_config(args: &ServeArgs) -> anyhow::Result<HeraldConfig> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    if args.no_producer {
        config.producer.enabled = false;
    }
    Ok(config)
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = resolve_serve_config(&args)?;
    let server = HeraldServer::new(config)?;

    let cfg = server.config();
    println!("{} Herald on {}", "✓".green().bold(), cfg.server.bind_addr.to_string().bold());
    println!("  Log capacity: {}", cfg.log.capacity.to_string().cyan());
    println!(
        "  Poll timeout: {}ms (max {}ms)",
        cfg.poll.default_timeout_ms, cfg.poll.max_timeout_ms
    );
    if cfg.producer.enabled {
        println!(
            "  Producer: {} every {}–{}ms",
            "on".green(),
            cfg.producer.min_interval_ms,
            cfg.producer.max_interval_ms
        );
    } else {
        println!("  Producer: {}", "off".yellow());
    }

    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    runtime.block_on(server.serve())?;
    println!("{} Herald stopped.", "✓".green());
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}
