use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{FormController, FormView, HttpPredictionClient, SubmitOutcome};
use shared::domain::FeatureName;
use tracing_subscriber::EnvFilter;

mod config;
mod terminal_view;

use config::load_settings;
use terminal_view::TerminalView;

#[derive(Parser, Debug)]
#[command(name = "cultivar", about = "Predict a wine's cultivar from its chemistry")]
struct Args {
    /// Base url of the prediction service.
    #[arg(long, global = true)]
    server_url: Option<String>,
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill the form and submit it once.
    Predict(PredictArgs),
    /// List the features the model was trained on.
    Features,
    /// Check that the service has its model loaded.
    Health,
}

#[derive(clap::Args, Debug)]
struct PredictArgs {
    #[arg(long, allow_hyphen_values = true)]
    alcohol: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    malic_acid: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    ash: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    total_phenols: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    flavanoids: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    color_intensity: Option<String>,
    /// Start from the demonstration values; explicit flags still apply on top.
    #[arg(long)]
    sample: bool,
}

impl PredictArgs {
    fn fields(&self) -> [(FeatureName, Option<&str>); 6] {
        [
            (FeatureName::Alcohol, self.alcohol.as_deref()),
            (FeatureName::MalicAcid, self.malic_acid.as_deref()),
            (FeatureName::Ash, self.ash.as_deref()),
            (FeatureName::TotalPhenols, self.total_phenols.as_deref()),
            (FeatureName::Flavanoids, self.flavanoids.as_deref()),
            (FeatureName::ColorIntensity, self.color_intensity.as_deref()),
        ]
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    init_tracing(&settings.log_level);

    let client = HttpPredictionClient::with_timeout(&settings.server_url, settings.request_timeout())
        .with_context(|| format!("cannot use server url '{}'", settings.server_url))?;
    tracing::debug!(server_url = %client.base_url(), "prediction client ready");

    match args.command {
        Command::Predict(predict) => {
            let view = Arc::new(TerminalView::new());
            let controller =
                FormController::with_timings(Arc::new(client), view.clone(), settings.timings());
            if predict.sample {
                controller.load_sample_data();
            }
            for (field, value) in predict.fields() {
                if let Some(value) = value {
                    view.set_field_value(field, value);
                }
            }

            match controller.submit().await {
                SubmitOutcome::Rendered(_) => {
                    view.results_ready().await;
                    print!("{}", view.render_results());
                    Ok(ExitCode::SUCCESS)
                }
                // The banner has already been written to stderr.
                SubmitOutcome::Invalid | SubmitOutcome::Rejected(_) | SubmitOutcome::Superseded => {
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Features => {
            let info = client.features().await.context("failed to fetch features")?;
            println!(
                "{} ({:.2}% accuracy)",
                info.model_algorithm,
                info.model_accuracy * 100.0
            );
            for key in &info.features {
                let label = match FeatureName::from_key(key) {
                    Some(name) => name.label(),
                    None => key.as_str(),
                };
                println!("  {key:<16} {label}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Health => {
            let health = client.health().await.context("failed to fetch health")?;
            println!("{}", serde_json::to_string_pretty(&health)?);
            Ok(if health.is_ready() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
