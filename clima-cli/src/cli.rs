use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clima_core::{
    Config, DisplayUnits, Event, EventReceiver, EventSender, FixedLocation, LocationFix, Outcome,
    WeatherController, WeatherView, provider_from_config,
};
use inquire::{InquireError, Select, Text};
use std::{sync::mpsc, time::Duration};
use tracing::debug;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "clima", version, about = "Current weather by city or coordinates")]
pub struct Cli {
    /// Verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the API key and preferred units.
    Configure,

    /// Look up the weather once and print it.
    Show {
        /// City name, sent as typed.
        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        city: Option<String>,

        #[command(flatten)]
        position: Position,

        /// Show Fahrenheit instead of the configured units.
        #[arg(long)]
        fahrenheit: bool,
    },

    /// Keep the current weather on screen; change city or units from a menu.
    Interactive {
        #[command(flatten)]
        position: Position,

        #[arg(long)]
        fahrenheit: bool,
    },
}

/// Where the location source says we are.
#[derive(Debug, Clone, Args)]
pub struct Position {
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Horizontal accuracy in meters; zero or less is treated as no fix.
    #[arg(long, default_value_t = 100.0, allow_hyphen_values = true)]
    pub accuracy: f64,
}

impl Position {
    fn source(&self) -> FixedLocation {
        let fix = self.lat.zip(self.lon).map(|(lat, lon)| LocationFix {
            lat,
            lon,
            horizontal_accuracy: self.accuracy,
        });
        FixedLocation::new(fix)
    }
}

const MENU_CITY: &str = "Change city";
const MENU_UNITS: &str = "Switch units";
const MENU_QUIT: &str = "Quit";

/// How long the menu holds back its next prompt for a pending update.
const RENDER_WAIT: Duration = Duration::from_secs(15);

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city, position, fahrenheit } => show(city, position, fahrenheit).await,
            Command::Interactive { position, fahrenheit } => interactive(position, fahrenheit).await,
        }
    }
}

fn units_for(config: &Config, fahrenheit: bool) -> DisplayUnits {
    if fahrenheit { DisplayUnits::Fahrenheit } else { config.units }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = Text::new("OpenWeather API key:")
        .with_initial_value(&config.api_key)
        .prompt()
        .context("Failed to read API key")?;
    config.api_key = api_key;

    let units = Select::new("Units:", vec!["celsius", "fahrenheit"])
        .with_starting_cursor(usize::from(!config.units.is_celsius()))
        .prompt()
        .context("Failed to read units")?;
    config.units = DisplayUnits::from_celsius_flag(units == "celsius");

    let path = config.save()?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}

fn controller_for(
    config: &Config,
    position: &Position,
    fahrenheit: bool,
) -> Result<(WeatherController, EventReceiver)> {
    let provider = provider_from_config(config)?;
    Ok(WeatherController::new(
        provider,
        Box::new(position.source()),
        units_for(config, fahrenheit),
    ))
}

/// Handle events until the view changes once.
async fn wait_for_render(controller: &mut WeatherController, events: &mut EventReceiver) {
    while let Some(event) = events.recv().await {
        let outcome = controller.handle(event);
        debug!(?outcome, "handled event");
        if outcome == Outcome::Rendered {
            break;
        }
    }
}

async fn show(city: Option<String>, position: Position, fahrenheit: bool) -> Result<()> {
    let config = Config::load()?;
    let (mut controller, mut events) = controller_for(&config, &position, fahrenheit)?;

    match city {
        Some(city) => {
            controller.on_city_entered(city);
        }
        None => controller.start_location(),
    }

    wait_for_render(&mut controller, &mut events).await;

    println!("{}", controller.view());
    Ok(())
}

async fn interactive(position: Position, fahrenheit: bool) -> Result<()> {
    let config = Config::load()?;
    let is_celsius = units_for(&config, fahrenheit).is_celsius();
    let (mut controller, events) = controller_for(&config, &position, fahrenheit)?;
    let sender = controller.sender();
    controller.start_location();

    // Views go to the menu thread, which prints them between prompts.
    let (views_tx, views) = mpsc::channel::<WeatherView>();
    let screen = tokio::spawn(controller.run(events, move |view| {
        let _ = views_tx.send(view.clone());
    }));

    let menu = tokio::task::spawn_blocking(move || menu_loop(sender, views, is_celsius))
        .await
        .context("Menu task panicked")?;

    screen.await.context("Controller task panicked")?;
    menu
}

/// Print the views posted so far, first waiting up to `wait` for one.
fn print_views(views: &mpsc::Receiver<WeatherView>, wait: Option<Duration>) {
    if let Some(wait) = wait {
        match views.recv_timeout(wait) {
            Ok(view) => println!("\n{view}\n"),
            Err(_) => debug!("no update yet, showing menu"),
        }
    }
    for view in views.try_iter() {
        println!("\n{view}\n");
    }
}

fn menu_loop(
    events: EventSender,
    views: mpsc::Receiver<WeatherView>,
    mut is_celsius: bool,
) -> Result<()> {
    print_views(&views, Some(RENDER_WAIT));

    loop {
        print_views(&views, None);

        let choice = match Select::new("clima", vec![MENU_CITY, MENU_UNITS, MENU_QUIT]).prompt() {
            Ok(choice) => choice,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => MENU_QUIT,
            Err(err) => {
                let _ = events.send(Event::Shutdown);
                return Err(err).context("Failed to read menu choice");
            }
        };

        match choice {
            MENU_CITY => {
                let prompt = WeatherController::city_prompt_on(events.clone());
                match Text::new("City:").prompt() {
                    Ok(city) => {
                        prompt.confirm(city);
                        print_views(&views, Some(RENDER_WAIT));
                    }
                    Err(InquireError::OperationCanceled) => prompt.cancel(),
                    Err(InquireError::OperationInterrupted) => {
                        prompt.cancel();
                        break;
                    }
                    Err(err) => {
                        prompt.cancel();
                        let _ = events.send(Event::Shutdown);
                        return Err(err).context("Failed to read city");
                    }
                }
            }
            MENU_UNITS => {
                is_celsius = !is_celsius;
                let _ = events.send(Event::UnitsToggled { is_celsius });
                print_views(&views, Some(RENDER_WAIT));
            }
            _ => break,
        }
    }

    let _ = events.send(Event::Shutdown);
    Ok(())
}
