use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use recon_proxy::{
    config::DEFAULT_CONFIG_PATH, Category, Context, ScopeMatcher, Settings, Target, Transport,
};
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Proxy pool acquisition, validation and scope filtering
#[derive(Parser)]
#[command(name = "recon-proxy")]
#[command(about = "Proxy pool acquisition, validation and scope filtering")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the proxy pool and print its size
    Proxies {
        /// Probe the pool and drop dead proxies
        #[arg(long)]
        validate: bool,
        /// Save the resulting pool in the proxy file format
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Tell whether an IP or FQDN is in scope
    Scope {
        identifier: String,
        /// Scope category (ip, fqdn); inferred from the identifier when omitted
        #[arg(long)]
        category: Option<String>,
    },
    /// Print a random proxy of the given transport (http, https, socks)
    Pick {
        transport: String,
        /// Probe the pool before picking
        #[arg(long)]
        validate: bool,
    },
    /// Check that target web servers answer (protocol://host:port)
    Health {
        targets: Vec<String>,
        /// Probe the pool before routing through it
        #[arg(long)]
        validate: bool,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn load_context(path: &Path, validate: bool) -> Result<Context> {
    let mut context = Context::load(path).await?;
    if validate {
        let summary = context.validate_proxies().await?;
        println!(
            "Validated {} proxies, dropped {}",
            summary.probed, summary.dropped
        );
    }
    Ok(context)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Proxies { validate, output } => {
            let context = load_context(&cli.config, validate).await?;
            println!("Proxy pool: {}", context.pool().counts());

            if let Some(output_path) = output {
                context.pool().save_to_file(&output_path)?;
                println!("Saved proxies to {:?}", output_path);
            }
        }
        Commands::Scope {
            identifier,
            category,
        } => {
            let settings = Settings::load(&cli.config)?;
            let scope = ScopeMatcher::new(&settings.scope)?;
            if !scope.has_any_scope_defined() {
                warn!("No scope defined, every target is considered in scope");
            }

            let category = match category {
                Some(c) => c.parse::<Category>()?,
                None => Category::infer(&identifier),
            };
            let verdict = if scope.is_in_scope(&identifier, category) {
                "in scope"
            } else {
                "out of scope"
            };
            println!("{} ({}): {}", identifier, category, verdict);
        }
        Commands::Pick {
            transport,
            validate,
        } => {
            let transport: Transport = transport.parse()?;
            let context = load_context(&cli.config, validate).await?;
            match context.pick(transport) {
                Some(proxy) => println!("{}", proxy.url()),
                None => println!("none"),
            }
        }
        Commands::Health { targets, validate } => {
            let targets = targets
                .iter()
                .map(|raw| raw.parse::<Target>())
                .collect::<recon_proxy::Result<Vec<_>>>()?;
            let context = load_context(&cli.config, validate).await?;

            let results = context
                .web_server_validator()
                .validate_targets(&targets, context.scope(), context.pool())
                .await;
            let mut failures = 0;
            for (target, result) in targets.iter().zip(results) {
                match result {
                    Ok(()) => println!("{} is up", target),
                    Err(e) => {
                        eprintln!("{}", e);
                        failures += 1;
                    }
                }
            }
            if failures > 0 {
                bail!("{} of {} targets failed", failures, targets.len());
            }
        }
    }

    Ok(())
}
