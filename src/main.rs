use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use densim::error::format_parse_error;
use densim::gibbs::{validate, ALLOWED_VARIABLES};
use densim::server::protocol::{DensityRequest, SampleRequest};
use densim::server::{self, catalogue};
use densim::{Config, Engine, SymbolicEngine};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "densim")]
#[command(about = "Analytic Gibbs sampling of bivariate densities")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Seed for the process-wide generator
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Check that a density can be sampled analytically
    Validate {
        expression: String,
        #[command(flatten)]
        bounds: BoundsArgs,
    },
    /// Draw samples from a density
    Sample {
        expression: String,
        #[command(flatten)]
        bounds: BoundsArgs,
        #[arg(long)]
        n_samples: Option<usize>,
        #[arg(long)]
        burn_in: Option<usize>,
        #[arg(long, allow_negative_numbers = true)]
        x_initial: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        y_initial: Option<f64>,
        #[arg(long)]
        seed: Option<u64>,
        /// Include plot traces in the output
        #[arg(long)]
        plot: bool,
    },
    /// List the bundled example densities
    Examples,
}

#[derive(Args)]
struct BoundsArgs {
    #[arg(long, allow_negative_numbers = true)]
    x_min: f64,
    #[arg(long, allow_negative_numbers = true)]
    x_max: f64,
    #[arg(long, allow_negative_numbers = true)]
    y_min: f64,
    #[arg(long, allow_negative_numbers = true)]
    y_max: f64,
}

impl BoundsArgs {
    fn request(&self, expression: String) -> DensityRequest {
        DensityRequest::new(expression, (self.x_min, self.x_max), (self.y_min, self.y_max))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Serve { host, port, seed } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if seed.is_some() {
                config.sampler.seed = seed;
            }
            config.validate()?;
            server::serve(config).await?;
        }
        Commands::Validate { expression, bounds } => {
            let request = bounds.request(expression);
            request.check(&config.sampler)?;
            let engine = Engine::with_limits(config.limits());
            if let Err(err) = engine.parse(&request.expression, &ALLOWED_VARIABLES) {
                eprintln!("{}", format_parse_error(&err, &request.expression));
            }
            print_json(&validate(&engine, &request.spec()))?;
        }
        Commands::Sample {
            expression,
            bounds,
            n_samples,
            burn_in,
            x_initial,
            y_initial,
            seed,
            plot,
        } => {
            let request = SampleRequest {
                density: bounds.request(expression),
                x_initial,
                y_initial,
                n_samples,
                burn_in,
                seed,
            };
            request.check(&config.sampler)?;
            let seed = seed.or(config.sampler.seed);
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let engine = Engine::with_limits(config.limits());
            let mut response =
                server::sample_response(&engine, &request, &config.sampler, &mut rng);
            response.seed = seed;
            if !plot {
                response.plot_data = None;
            }
            let success = response.success;
            print_json(&response)?;
            if !success {
                bail!("sampling failed");
            }
        }
        Commands::Examples => print_json(&catalogue::examples())?,
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => {
            let mut config = Config::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
