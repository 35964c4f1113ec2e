//! Command line control of Solem irrigation controllers over BLE
//!
//! Connects to one controller, sends a single command and disconnects.

mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use data_encoding::HEXLOWER;
use solem_ble_controller::{with_session, BtleTransport, DeviceInfo, LogSink};
use solem_proto::{CodecError, Command, WateringTime};

use crate::config::{AddressKind, Overrides};

#[derive(Parser)]
#[command(name = "solem-ble")]
#[command(about = "Control Solem irrigation controllers over BLE")]
struct Cli {
    /// Controller address, e.g. C8:B9:61:0A:47:FD (default: from config.json)
    #[arg(short, long)]
    device: Option<String>,
    /// Config file (default: $SOLEM_HOME/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Connect attempts before giving up
    #[arg(long)]
    retries: Option<u32>,
    /// Seconds to wait between connect attempts
    #[arg(long)]
    backoff: Option<u64>,
    #[arg(long, value_enum)]
    address_type: Option<AddressKind>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Switch the controller on
    On,
    /// Switch the controller off permanently
    Off,
    /// Switch the controller off for a number of days
    Disable {
        #[arg(long)]
        days: u8,
    },
    /// Stop any manual watering
    Stop,
    /// Water every station
    WaterAll {
        #[arg(short, long)]
        minutes: u32,
    },
    /// Water one station
    Water {
        #[arg(short, long)]
        zone: u8,
        #[arg(short, long)]
        minutes: u32,
    },
    /// Run a stored program
    Program {
        #[arg(short, long)]
        id: u16,
    },
    /// Print the controller's name and connection parameters
    Info,
}

impl Commands {
    /// The controller command to send, or `None` for read-only subcommands.
    fn to_command(&self) -> Result<Option<Command>, CodecError> {
        let command = match *self {
            Commands::On => Command::PowerOn,
            Commands::Off => Command::PowerOff,
            Commands::Disable { days } => Command::DisableForDays(days),
            Commands::Stop => Command::StopWatering,
            Commands::WaterAll { minutes } => {
                Command::StartAllZones(WateringTime::from_minutes(minutes)?)
            }
            Commands::Water { zone, minutes } => Command::StartZone {
                zone,
                duration: WateringTime::from_minutes(minutes)?,
            },
            Commands::Program { id } => Command::RunProgram(id),
            Commands::Info => return Ok(None),
        };
        Ok(Some(command))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let file = config::load(cli.config.as_deref())?;
    let address = cli
        .device
        .clone()
        .or_else(|| file.device.clone())
        .ok_or("no device address, pass --device or set \"device\" in config.json")?;
    let session_config = file.session_config(&Overrides {
        address_type: cli.address_type,
        retries: cli.retries,
        backoff_secs: cli.backoff,
    });
    let transport = BtleTransport::with_timeouts(
        file.scan_timeout().unwrap_or(BtleTransport::DEFAULT_SCAN_TIMEOUT),
        file.io_timeout().unwrap_or(BtleTransport::DEFAULT_IO_TIMEOUT),
    );

    // Validate before touching the radio
    match cli.command.to_command()? {
        Some(command) => {
            with_session(transport, LogSink, session_config, &address, async |session| {
                session.issue(&command).await
            })
            .await?;
            println!("{command}: sent to {address}");
        }
        None => {
            let info = with_session(transport, LogSink, session_config, &address, async |session| {
                session.device_info().await
            })
            .await?;
            print_info(&address, &info);
        }
    }

    Ok(())
}

fn print_info(address: &str, info: &DeviceInfo) {
    println!("Controller {address}");
    println!("  Name: {}", info.name.as_deref().unwrap_or("N/A"));
    match &info.capabilities {
        Some(capabilities) => println!("  Capabilities: {}", HEXLOWER.encode(capabilities)),
        None => println!("  Capabilities: N/A"),
    }
    match &info.preferred_params {
        Some(params) => println!(
            "  Connection interval: {:.2}-{:.2} ms, latency {}, timeout {} ms",
            f64::from(params.min_interval) * 1.25,
            f64::from(params.max_interval) * 1.25,
            params.latency,
            u32::from(params.timeout) * 10,
        ),
        None => println!("  Connection parameters: N/A"),
    }
}
