use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{ArgAction, Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode};
use tracing::error;
use weather_core::{
    CityOutcome, Config, HistoryStore, WeatherError, WeatherService,
    fetcher::fetcher_from_config,
};

use crate::{menu, server};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather reporter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// More log output (-v, -vv, -vvv).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Attempts per fetch, overriding the config file.
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..))]
    pub retries: Option<u32>,

    /// Seconds to wait between attempts, overriding the config file.
    #[arg(long, global = true)]
    pub delay: Option<f64>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key in the config file.
    Configure,

    /// Show the current weather for a city.
    Show {
        /// City name (letters and spaces only).
        city: String,
    },

    /// Fetch several cities concurrently and summarize them.
    Multi {
        /// Comma-separated city names, e.g. "Cairo,Tokyo,San Jose".
        #[arg(value_delimiter = ',', required = true)]
        cities: Vec<String>,
    },

    /// Interactive menu: check weather, view history, export to CSV.
    Menu,

    /// Serve the HTTP API.
    Serve {
        /// Listen address; defaults to `server.bind` from the config file.
        #[arg(long)]
        bind: Option<String>,
    },
}

impl Command {
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Command::Serve { .. } => "info",
            _ => "warn",
        }
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = Config::load()?;
        self.apply_overrides(&mut config);

        match self.command {
            Command::Configure => configure()?,
            Command::Show { city } => {
                let service = build_service(&config)?;
                show(&service, &city).await?;
            }
            Command::Multi { cities } => {
                let service = build_service(&config)?;
                multi(&service, &cities).await?;
            }
            Command::Menu => {
                let policy = config.retry_policy()?;
                tokio::task::spawn_blocking(move || menu::run(&config, policy))
                    .await
                    .context("Interactive menu thread failed")??;
            }
            Command::Serve { bind } => {
                let bind = bind.unwrap_or_else(|| config.server.bind.clone());
                let service = build_service(&config)?;
                server::serve(service, &bind).await?;
            }
        }

        Ok(())
    }

    fn apply_overrides(&self, config: &mut Config) {
        if let Some(retries) = self.retries {
            config.retry.max_attempts = retries;
        }
        if let Some(delay) = self.delay {
            config.retry.delay_secs = delay;
        }
    }
}

fn build_service(config: &Config) -> anyhow::Result<WeatherService> {
    let policy = config.retry_policy()?;
    let fetcher = fetcher_from_config(config)?;
    Ok(WeatherService::new(
        fetcher,
        Arc::new(HistoryStore::new()),
        policy,
    ))
}

fn configure() -> anyhow::Result<()> {
    // Read the file itself: a key from the environment must not be written to disk.
    let path = Config::config_file_path()?;
    let mut config = Config::load_from(&path)?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_help_message("Get one at https://openweathermap.org/api")
        .prompt()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        bail!("API key must not be empty");
    }

    config.set_api_key(api_key.trim().to_string());
    config.save_to(&path)?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}

async fn show(service: &WeatherService, city: &str) -> anyhow::Result<()> {
    println!("Checking weather...");

    match service.check_city(city).await {
        Ok(record) => {
            println!("{record}");
            Ok(())
        }
        Err(err @ WeatherError::InvalidCity(_)) => Err(err.into()),
        Err(err) => {
            error!(city, error = %err, "Weather fetch failed after retries");
            bail!("Failed to fetch weather for {city}. Please try again later.")
        }
    }
}

async fn multi(service: &WeatherService, cities: &[String]) -> anyhow::Result<()> {
    let reports = service.check_many(cities).await.map_err(|err| {
        error!(error = %err, "Fan-out fetch failed");
        anyhow::anyhow!("Internal error during weather fetch")
    })?;

    for report in &reports {
        match &report.outcome {
            CityOutcome::Success(record) => println!("[success] {record}"),
            outcome => println!("[{}] {}", outcome.status(), report.city),
        }
    }

    match service.history().summarize() {
        Some(summary) => println!("\n{summary}"),
        None => println!("\nNo weather data recorded yet."),
    }

    if reports.iter().any(|r| r.outcome == CityOutcome::Failed) {
        println!(
            "Some cities failed after {} attempt(s).",
            service.policy().max_attempts()
        );
    }

    Ok(())
}
