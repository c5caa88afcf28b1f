//! `aegis` command line

use aegis_cli::{run_simulator, SimulatorConfig};
use aegis_core::AegisConfig;
use anyhow::Context as _;
use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AegisConfig> {
    let Some(path) = path else {
        return Ok(AegisConfig::default());
    };
    AegisConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("aegis")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Aegis resilience layer tooling")
        .subcommand_required(true)
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit tracing output as JSON lines"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run a seeded widget failure storm")
                .arg(
                    Arg::new("widgets")
                        .long("widgets")
                        .default_value("12")
                        .value_parser(value_parser!(usize))
                        .help("Number of widgets on the dashboard"),
                )
                .arg(
                    Arg::new("failures")
                        .long("failures")
                        .default_value("200")
                        .value_parser(value_parser!(u64))
                        .help("Number of failures to inject"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("recovery-rate")
                        .long("recovery-rate")
                        .default_value("0.25")
                        .value_parser(value_parser!(f64))
                        .help("Chance that a retry clears a failing widget"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the report as JSON"),
                ),
        )
        .subcommand(
            Command::new("check-config")
                .about("Validate a configuration file and print it with defaults filled in")
                .arg(
                    Arg::new("path")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                ),
        );

    let matches = cli.get_matches();
    init_tracing(matches.get_flag("json-logs"));

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let aegis = load_config(args.get_one::<PathBuf>("config"))?;
            let config = SimulatorConfig {
                seed: args.get_one::<u64>("seed").copied().unwrap_or(42),
                widgets: args.get_one::<usize>("widgets").copied().unwrap_or(12),
                failures: args.get_one::<u64>("failures").copied().unwrap_or(200),
                recovery_rate: args.get_one::<f64>("recovery-rate").copied().unwrap_or(0.25),
                aegis,
            };

            let report = run_simulator(config).await?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.generate_text());
            }

            if !report.passed() {
                std::process::exit(1);
            }
        }
        Some(("check-config", args)) => {
            let path = args.get_one::<PathBuf>("path");
            let config = load_config(path)?;
            print!("{}", config.to_toml_string()?);
        }
        _ => unreachable!("subcommand_required"),
    }

    Ok(())
}
