//! CLI Entry Point for photon-dome
//!
//! Provides command-line control of one dome controller:
//! - Status and motion commands (slew, sync, shutter, park)
//! - Raw action dispatch (`DC:<TAG>`)
//! - Profile inspection and editing
//!
//! # Usage
//!
//! ```bash
//! photon-dome --port /dev/ttyACM0 status
//! photon-dome slew 183.5
//! photon-dome --simulate action DC:T
//! photon-dome profile set-port COM4
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use photon_dome::adapters::{Connector, MockDevice, SerialConnector};
use photon_dome::clock::SystemClock;
use photon_dome::config::DomeConfig;
use photon_dome::dome::identity;
use photon_dome::logging::{self, OutputFormat, TracingConfig};
use photon_dome::{AsyncDome, Dome};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "photon-dome", version)]
#[command(about = "Control an Arduino+Photon dome controller over serial", long_about = None)]
struct Cli {
    /// Profile file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serial port, overriding the profile
    #[arg(long, global = true)]
    port: Option<String>,

    /// Talk to an in-memory simulated controller instead of a serial port
    #[arg(long, global = true)]
    simulate: bool,

    /// Log output format (pretty, compact, json)
    #[arg(long, global = true, default_value = "compact")]
    log_format: OutputFormat,

    /// Disable ANSI colors in pretty output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log span open/close events (implied by the profile's trace switch)
    #[arg(long, global = true)]
    spans: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print azimuth, shutter, park and slew state
    Status,

    /// Slew to an azimuth in degrees
    Slew {
        #[arg(allow_negative_numbers = true)]
        azimuth: f64,
    },

    /// Declare the current azimuth
    Sync {
        #[arg(allow_negative_numbers = true)]
        azimuth: f64,
    },

    /// Open the shutter
    Open,

    /// Close the shutter
    Close,

    /// Move to the park position
    Park,

    /// Set the park position (current azimuth if omitted)
    SetPark {
        #[arg(allow_negative_numbers = true)]
        azimuth: Option<f64>,
    },

    /// Stop azimuth motion
    Abort,

    /// List supported action names
    Actions,

    /// Run a raw action, e.g. `action DC:SLEWAZ 90`
    Action {
        /// Action name including the device prefix
        name: String,
        /// Parameter appended to argument-taking actions
        params: Option<String>,
    },

    /// Print driver identity and capabilities
    Info,

    /// Inspect or edit the profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Print the effective profile
    Show,
    /// Store the serial port
    SetPort { port: String },
    /// Store the trace switch
    SetTrace {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let profile_path = cli.config.clone().or_else(DomeConfig::default_path);
    let mut config = match &profile_path {
        Some(path) => DomeConfig::load_from(path),
        None => DomeConfig::load(),
    }
    .context("Failed to load profile")?;

    let tracing_config = TracingConfig::from_dome_config(&config)
        .map_err(|e| anyhow!(e))?
        .with_format(cli.log_format)
        .with_ansi(!cli.no_color);
    let spans = tracing_config.with_span_events || cli.spans;
    let tracing_config = tracing_config.with_span_events(spans);
    logging::init(tracing_config).map_err(|e| anyhow!(e))?;

    match cli.command {
        Commands::Profile { command } => {
            run_profile(command, &mut config, profile_path.as_deref())
        }
        Commands::Info => {
            print_info();
            Ok(())
        }
        Commands::Actions => {
            for action in photon_dome::dome::SUPPORTED_ACTIONS {
                println!("DC:{action}");
            }
            Ok(())
        }
        command => {
            let port = cli.port.unwrap_or_else(|| config.connection.port.clone());
            let dome = AsyncDome::new(build_dome(&config, cli.simulate));
            dome.connect(port.clone())
                .await
                .with_context(|| format!("Failed to connect on {port}"))?;
            info!(%port, "connected");

            let outcome = run_command(&dome, command).await;
            dome.disconnect().await?;
            outcome
        }
    }
}

fn build_dome(config: &DomeConfig, simulate: bool) -> Dome {
    let connector: Box<dyn Connector> = if simulate {
        Box::new(MockDevice::simulated().with_clock(Arc::new(SystemClock)))
    } else {
        Box::new(SerialConnector)
    };
    Dome::with_settings(
        connector,
        Arc::new(SystemClock),
        config.link_settings(),
        config.engine_settings(),
    )
}

async fn run_command(dome: &AsyncDome, command: Commands) -> Result<()> {
    match command {
        Commands::Status => {
            println!("azimuth:  {:.2}", dome.get_azimuth().await?);
            println!("shutter:  {}", dome.get_shutter_status().await?);
            println!("parked:   {}", dome.is_parked().await?);
            println!("slewing:  {}", dome.is_slewing().await?);
            println!("firmware: {}", dome.version().await?);
        }
        Commands::Slew { azimuth } => dome.slew_to(azimuth).await?,
        Commands::Sync { azimuth } => dome.sync_to(azimuth).await?,
        Commands::Open => dome.open_shutter().await?,
        Commands::Close => dome.close_shutter().await?,
        Commands::Park => dome.park().await?,
        Commands::SetPark { azimuth: Some(az) } => dome.set_park_to(az).await?,
        Commands::SetPark { azimuth: None } => dome.set_park().await?,
        Commands::Abort => dome.abort_slew().await?,
        Commands::Action { name, params } => {
            let reply = dome.action(name, params.unwrap_or_default()).await?;
            println!("{reply}");
        }
        Commands::Actions | Commands::Info | Commands::Profile { .. } => {
            return Err(anyhow!("command does not use the controller"));
        }
    }
    Ok(())
}

fn run_profile(
    command: ProfileCommand,
    config: &mut DomeConfig,
    path: Option<&std::path::Path>,
) -> Result<()> {
    match command {
        ProfileCommand::Show => {
            print!("{}", toml::to_string_pretty(&*config)?);
            return Ok(());
        }
        ProfileCommand::SetPort { port } => config.connection.port = port,
        ProfileCommand::SetTrace { enabled } => config.logging.trace = enabled,
    }
    config.validate()?;
    let path = path.ok_or_else(|| anyhow!("No profile path; pass --config"))?;
    config.save(path)?;
    println!("Saved {}", path.display());
    Ok(())
}

fn print_info() {
    println!("{}", identity::NAME);
    println!("{}", identity::DESCRIPTION);
    println!("{}", identity::driver_info());
    println!("driver id:         {}", identity::DRIVER_ID);
    println!("driver version:    {}", identity::driver_version());
    println!("interface version: {}", identity::INTERFACE_VERSION);

    let caps = photon_dome::dome::DomeCapabilities::PHOTON;
    println!("can_find_home:     {}", caps.can_find_home);
    println!("can_park:          {}", caps.can_park);
    println!("can_set_altitude:  {}", caps.can_set_altitude);
    println!("can_set_azimuth:   {}", caps.can_set_azimuth);
    println!("can_set_park:      {}", caps.can_set_park);
    println!("can_set_shutter:   {}", caps.can_set_shutter);
    println!("can_slave:         {}", caps.can_slave);
    println!("can_sync_azimuth:  {}", caps.can_sync_azimuth);
}
