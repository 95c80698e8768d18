//! Interactive menu. Runs on a blocking thread and uses the blocking fetcher,
//! so every prompt and every retry delay simply blocks.

use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use inquire::{InquireError, Select, Text, validator::Validation};
use tracing::{error, info};
use weather_core::{
    BlockingWeatherFetcher, Config, HistoryStore, RetryExhausted, RetryPolicy, WeatherError,
    WeatherRecord, fetcher::blocking_fetcher_from_config, is_valid_city_name,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuChoice {
    CheckWeather,
    ViewHistory,
    ExportCsv,
    Summary,
    Exit,
}

impl MenuChoice {
    const ALL: [MenuChoice; 5] = [
        MenuChoice::CheckWeather,
        MenuChoice::ViewHistory,
        MenuChoice::ExportCsv,
        MenuChoice::Summary,
        MenuChoice::Exit,
    ];
}

impl fmt::Display for MenuChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuChoice::CheckWeather => "1. Check Weather",
            MenuChoice::ViewHistory => "2. View History",
            MenuChoice::ExportCsv => "3. Export to CSV",
            MenuChoice::Summary => "4. Summary",
            MenuChoice::Exit => "5. Exit",
        };
        f.write_str(label)
    }
}

/// Build the menu from config and run it until the user exits.
pub fn run(config: &Config, policy: RetryPolicy) -> Result<()> {
    let fetcher = blocking_fetcher_from_config(config)?;
    let menu = Menu::new(fetcher, policy, config.export_path());
    menu.run()
}

struct Menu {
    fetcher: Arc<dyn BlockingWeatherFetcher>,
    history: HistoryStore,
    policy: RetryPolicy,
    export_path: PathBuf,
}

impl Menu {
    fn new(
        fetcher: Arc<dyn BlockingWeatherFetcher>,
        policy: RetryPolicy,
        export_path: PathBuf,
    ) -> Self {
        Self {
            fetcher,
            history: HistoryStore::new(),
            policy,
            export_path,
        }
    }

    fn run(&self) -> Result<()> {
        println!("Welcome to Weather Reporter");

        loop {
            let answer = Select::new("Choose an option:", MenuChoice::ALL.to_vec()).prompt();
            let Some(choice) = unless_cancelled(answer)? else {
                break;
            };

            match choice {
                MenuChoice::CheckWeather => {
                    let Some(city) = prompt_city()? else {
                        continue;
                    };
                    println!("Checking weather...");
                    match self.check_weather(&city) {
                        Ok(record) => println!("{record}"),
                        Err(err) => {
                            error!(
                                city = %city,
                                error = %err,
                                "Weather fetch failed after retries"
                            );
                            println!(
                                "Failed to fetch weather for {city}. Please try again later."
                            );
                        }
                    }
                }
                MenuChoice::ViewHistory => println!("{}", self.history),
                MenuChoice::ExportCsv => println!("{}", self.export_csv()),
                MenuChoice::Summary => println!("{}", self.summary()),
                MenuChoice::Exit => break,
            }
        }

        println!("End!");
        Ok(())
    }

    /// Fetch with retries and record the result. `city` has already been validated.
    fn check_weather(&self, city: &str) -> Result<WeatherRecord, RetryExhausted<WeatherError>> {
        let record = self.policy.retry_blocking(|| self.fetcher.fetch_weather(city))?;
        self.history.record(record.clone());
        Ok(record)
    }

    fn export_csv(&self) -> String {
        info!(path = %self.export_path.display(), "Exporting to CSV");
        match self.history.export_csv(&self.export_path) {
            Ok(Some(path)) => format!("Exported to {}", path.display()),
            Ok(None) => "No weather records to export.".to_string(),
            Err(err) => {
                error!(error = %err, "CSV export failed");
                format!("Export failed: {err}")
            }
        }
    }

    fn summary(&self) -> String {
        match self.history.summarize() {
            Some(summary) => summary.to_string(),
            None => "No weather data recorded yet.".to_string(),
        }
    }
}

/// Ask for a city until a valid one is entered. `None` if the user cancels.
fn prompt_city() -> Result<Option<String>> {
    let answer = Text::new("Enter city name:")
        .with_validator(|input: &str| {
            Ok(if is_valid_city_name(input) {
                Validation::Valid
            } else {
                Validation::Invalid("Invalid City Name! Letters and spaces only.".into())
            })
        })
        .prompt();

    Ok(unless_cancelled(answer)?.map(|city| city.trim().to_string()))
}

/// Esc and Ctrl-C both back out of a prompt; any other prompt error is fatal.
fn unless_cancelled<T>(answer: Result<T, InquireError>) -> Result<Option<T>> {
    match answer {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(err) => Err(err.into()),
    }
}
