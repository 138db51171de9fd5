use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{info, warn};
use weather_bot_core::{
    Config, ForecastKind, ForecastService, GismeteoProvider, SqliteCoordinateStore,
    provider_from_config,
};

const GREETING: &str = "Welcome! I am a weather forecast bot.\n\n\
    To get a forecast, send me your location. \
    Then pick the forecast you need from the menu and I will send it to you.";
const LOCATION_SAVED: &str = "Thank you, your location has been received!";
const UNKNOWN_COMMAND: &str =
    "Sorry, I did not understand you. Please pick a command from the menu.";

type Service = ForecastService<SqliteCoordinateStore, GismeteoProvider>;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-bot", version, about = "Weather forecast bot")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the weather provider API token.
    Configure,

    /// Print the greeting a new user receives.
    Start,

    /// Remember a user's location.
    Locate {
        user: i64,

        #[arg(allow_negative_numbers = true)]
        latitude: f64,

        #[arg(allow_negative_numbers = true)]
        longitude: f64,
    },

    /// Show the stored location of a user.
    Location { user: i64 },

    /// Show the forecast for a user's stored location.
    Forecast {
        user: i64,

        /// One of: current, today, tomorrow.
        #[arg(value_parser = parse_kind)]
        kind: ForecastKind,
    },

    /// Read chat events from stdin, one per line, and answer each of them.
    ///
    /// Lines look like `<user> current`, `<user> locate <lat> <lon>` or `<user> /start`.
    Serve,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;

        match self.command {
            Command::Configure => configure(config)?,
            Command::Start => println!("{GREETING}"),
            Command::Locate {
                user,
                latitude,
                longitude,
            } => {
                let service = build_service(&config)?;
                println!("{}", locate(&service, user, latitude, longitude).await);
            }
            Command::Location { user } => match open_store(&config)?.record(user)? {
                Some(record) => println!(
                    "User {}: {}, {} (updated {})",
                    record.user_id,
                    record.coordinates.latitude,
                    record.coordinates.longitude,
                    record.updated_at
                ),
                None => println!("No location stored for user {user}"),
            },
            Command::Forecast { user, kind } => {
                let service = build_service(&config)?;
                println!("{}", service.reply(user, kind).await);
            }
            Command::Serve => serve(Arc::new(build_service(&config)?)).await?,
        }

        Ok(())
    }
}

fn configure(mut config: Config) -> anyhow::Result<()> {
    let token = inquire::Password::new("Gismeteo API token:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API token")?;

    config.set_api_token(token);
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn open_store(config: &Config) -> anyhow::Result<Arc<SqliteCoordinateStore>> {
    let path = config.database_file_path()?;
    let store = SqliteCoordinateStore::open(&path)
        .with_context(|| format!("Failed to open coordinate database {}", path.display()))?;
    Ok(Arc::new(store))
}

fn build_service(config: &Config) -> anyhow::Result<Service> {
    let provider = provider_from_config(config)?;
    let service = ForecastService::new(open_store(config)?, provider)
        .with_tomorrow_offset(config.tomorrow_offset);
    Ok(service)
}

async fn serve(service: Arc<Service>) -> anyhow::Result<()> {
    info!("Waiting for events on stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tasks = JoinSet::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let Some(event) = Event::parse(&line) else {
            warn!(%line, "Ignoring event without a user id");
            continue;
        };

        let service = Arc::clone(&service);
        tasks.spawn(async move {
            let reply = event.handle(&service).await;
            println!("{}: {}", event.user, reply);
        });

        // Reap finished handlers so the set does not grow without bound.
        while tasks.try_join_next().is_some() {}
    }

    while tasks.join_next().await.is_some() {}
    Ok(())
}

/// Save a shared location and return the confirmation or the reason it was refused.
async fn locate(service: &Service, user: i64, latitude: f64, longitude: f64) -> String {
    match service.remember_location(user, latitude, longitude).await {
        Ok(()) => LOCATION_SAVED.to_string(),
        Err(err) => {
            warn!(user_id = user, "Failed to store location: {err}");
            err.user_message()
        }
    }
}

fn parse_kind(value: &str) -> Result<ForecastKind, String> {
    ForecastKind::try_from(value).map_err(|e| e.to_string())
}

/// One message from a chat user.
#[derive(Debug, Clone, PartialEq)]
struct Event {
    user: i64,
    action: Action,
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Start,
    Locate { latitude: f64, longitude: f64 },
    Forecast(ForecastKind),
    Unknown,
}

impl Event {
    /// Parse `<user> <command> [args..]`. Chat-style command names are accepted too.
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let user = parts.next()?.parse().ok()?;

        let action = match parts.next() {
            Some("start" | "/start") => Action::Start,
            Some("current" | "/current_weather") => Action::Forecast(ForecastKind::Current),
            Some("today" | "/weather_today") => Action::Forecast(ForecastKind::Today),
            Some("tomorrow" | "/weather_tomorrow") => Action::Forecast(ForecastKind::Tomorrow),
            Some("locate") => {
                let latitude = parts.next().and_then(|v| v.parse().ok());
                let longitude = parts.next().and_then(|v| v.parse().ok());
                match (latitude, longitude) {
                    (Some(latitude), Some(longitude)) => Action::Locate {
                        latitude,
                        longitude,
                    },
                    _ => Action::Unknown,
                }
            }
            _ => Action::Unknown,
        };

        Some(Self { user, action })
    }

    async fn handle(&self, service: &Service) -> String {
        match self.action {
            Action::Start => GREETING.to_string(),
            Action::Locate {
                latitude,
                longitude,
            } => locate(service, self.user, latitude, longitude).await,
            Action::Forecast(kind) => service.reply(self.user, kind).await,
            Action::Unknown => UNKNOWN_COMMAND.to_string(),
        }
    }
}
