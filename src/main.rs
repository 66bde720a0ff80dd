//! moodrl command-line interface.
//!
//! Simulates synthetic datasets, evaluates log densities of parameter draws,
//! generates posterior predictive draws and compares two models by WAIC.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use moodrl::core::posterior::Posterior;
use moodrl::core::predictive::{simulate_many, PredictiveDraw};
use moodrl::core::ModelConfig;
use moodrl::data::io::{load_task, read_json, write_json, TaskTable};
use moodrl::data::synthetic::{generate, TaskDesign};
use moodrl::data::TaskData;
use moodrl::diagnostics::{compare, pointwise_log_lik, summarize_group, waic, Observations};
use moodrl::params::{CdfKind, HierarchicalPrior, ModelParams, PriorConfig};

#[derive(Parser, Debug)]
#[command(
    name = "moodrl",
    about = "Hierarchical reward-learning model with mood",
    version
)]
struct Cli {
    /// Worker threads for per-subject evaluation (defaults to all cores).
    #[arg(long, global = true, env = "RAYON_NUM_THREADS")]
    threads: Option<usize>,

    /// Standard-normal CDF used by the parameter transforms.
    #[arg(long, global = true, value_enum, default_value_t = CdfKind::Exact)]
    cdf: CdfKind,

    /// Evaluate subjects sequentially.
    #[arg(long, global = true, default_value_t = false)]
    sequential: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Draw parameters from the prior and simulate a dataset.
    Simulate {
        #[arg(short = 'n', long, default_value_t = 20)]
        subjects: usize,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Task design (JSON); defaults to 3 blocks of 42 trials.
        #[arg(long)]
        design: Option<PathBuf>,

        /// Prior hyperparameters (JSON).
        #[arg(long)]
        prior: Option<PathBuf>,

        /// Output dataset (tabular JSON).
        #[arg(long, default_value = "task.json")]
        data_out: PathBuf,

        /// Output generating parameters (JSON list with one draw).
        #[arg(long, default_value = "params.json")]
        params_out: PathBuf,
    },

    /// Evaluate prior, likelihood and posterior density of parameter draws.
    Loglik {
        #[arg(long)]
        data: PathBuf,

        /// JSON list of parameter draws.
        #[arg(long)]
        params: PathBuf,

        #[arg(long)]
        prior: Option<PathBuf>,

        /// Mass of the reported highest-density intervals.
        #[arg(long, default_value_t = 0.95)]
        cred_mass: f64,
    },

    /// Generate posterior predictive draws.
    Predict {
        #[arg(long)]
        data: PathBuf,

        /// JSON list of parameter draws.
        #[arg(long)]
        params: PathBuf,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        #[arg(long, default_value = "predictive.json")]
        out: PathBuf,

        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// Compare two models by WAIC on their predictive draws.
    Compare {
        #[arg(long)]
        data: PathBuf,

        /// Predictive draws of model A.
        #[arg(long)]
        a: PathBuf,

        /// Predictive draws of model B.
        #[arg(long)]
        b: PathBuf,

        #[arg(long, value_enum, default_value_t = Observations::Both)]
        on: Observations,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Bincode,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Some(n) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("failed to build the worker pool")?;
    }

    tracing::info!("moodrl v{}", env!("CARGO_PKG_VERSION"));
    let config = ModelConfig {
        cdf: cli.cdf,
        parallel: !cli.sequential,
    };

    match cli.command {
        Command::Simulate {
            subjects,
            seed,
            design,
            prior,
            data_out,
            params_out,
        } => {
            let design: TaskDesign = match design {
                Some(path) => read_json(&path)?,
                None => TaskDesign::default(),
            };
            let prior = load_prior(prior.as_deref())?;
            let mut rng = StdRng::seed_from_u64(seed);
            let params = prior.sample(subjects, &mut rng)?;
            let task = generate(&params, &design, &config, &mut rng)?;

            write_json(&data_out, &TaskTable::from_data(&task.data))?;
            write_json(&params_out, &vec![params])?;
        }

        Command::Loglik {
            data,
            params,
            prior,
            cred_mass,
        } => {
            let data = load_task(&data)?;
            let draws = load_draws(&params, &data)?;
            let posterior = Posterior::new(data, load_prior(prior.as_deref())?, config.clone());

            for (d, draw) in draws.iter().enumerate() {
                let b = posterior
                    .evaluate(draw)
                    .with_context(|| format!("draw {} could not be evaluated", d + 1))?;
                println!(
                    "draw {:>4}: log prior {:>12.4}  choice {:>12.4}  mood {:>12.4}  total {:>12.4}",
                    d + 1,
                    b.log_prior,
                    b.log_likelihood.choice,
                    b.log_likelihood.mood,
                    b.total()
                );
            }
            if draws.len() > 1 {
                for s in summarize_group(&draws, config.cdf, cred_mass)? {
                    println!(
                        "{:>6}: mean {:>9.4}  HDI [{:.4}, {:.4}]",
                        s.name, s.mean, s.lower, s.upper
                    );
                }
            }
        }

        Command::Predict {
            data,
            params,
            seed,
            out,
            format,
        } => {
            let data = load_task(&data)?;
            let draws = load_draws(&params, &data)?;
            let predictive = simulate_many(&draws, &data, &config, seed)?;
            match format {
                Format::Json => write_json(&out, &predictive)?,
                Format::Bincode => {
                    let bytes = bincode::serialize(&predictive)?;
                    fs::write(&out, bytes)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                    tracing::info!("wrote {}", out.display());
                }
            }
        }

        Command::Compare { data, a, b, on } => {
            let data = load_task(&data)?;
            let wa = waic(&pointwise_log_lik(&load_predictive(&a)?, &data, on)?)?;
            let wb = waic(&pointwise_log_lik(&load_predictive(&b)?, &data, on)?)?;
            let c = compare(&wa, &wb)?;
            println!("Model comparison ({:?})", on);
            println!("WAIC[a] = {:.0}", c.a);
            println!("WAIC[b] = {:.0}", c.b);
            println!("Diff    = {:.2} ({:.2})", c.diff, c.se);
        }
    }

    Ok(())
}

fn load_prior(path: Option<&Path>) -> anyhow::Result<HierarchicalPrior> {
    let config: PriorConfig = match path {
        Some(p) => read_json(p)?,
        None => PriorConfig::default(),
    };
    Ok(HierarchicalPrior::new(config)?)
}

fn load_draws(path: &Path, data: &TaskData) -> anyhow::Result<Vec<ModelParams>> {
    let draws: Vec<ModelParams> = read_json(path)?;
    if draws.is_empty() {
        bail!("{} holds no parameter draws", path.display());
    }
    for (d, draw) in draws.iter().enumerate() {
        draw.validate()
            .with_context(|| format!("draw {} in {}", d + 1, path.display()))?;
        if draw.n_subjects() != data.n_subjects() {
            bail!(
                "draw {} has {} subjects, dataset has {}",
                d + 1,
                draw.n_subjects(),
                data.n_subjects()
            );
        }
    }
    Ok(draws)
}

/// Reads predictive draws written by `predict`; `.bin` files are bincode.
fn load_predictive(path: &Path) -> anyhow::Result<Vec<PredictiveDraw>> {
    if path.extension().is_some_and(|e| e == "bin") {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        bincode::deserialize(&bytes).with_context(|| format!("failed to decode {}", path.display()))
    } else {
        read_json(path)
    }
}
