use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use l9110_i2c::config::{DEFAULT_BUS_NUMBER, DeviceConfig};
use l9110_i2c::motor::{Bus, L9110, LogBus};
use l9110_i2c::{Direction, MotorChannel, ServoChannel};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "l9110", version, about = "Drive an L9110 servo/motor board over I2C")]
struct Cli {
    /// I2C adapter number (/dev/i2c-N).
    #[arg(long, default_value_t = DEFAULT_BUS_NUMBER, global = true)]
    bus: u8,

    /// Device address, hex (0x41) or decimal. Overrides the config file.
    #[arg(long, value_parser = parse_address, global = true)]
    address: Option<u8>,

    /// JSON file with address and servo ranges.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log frames instead of writing to the bus.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Move a servo to an angle.
    Servo {
        #[arg(value_enum)]
        channel: ServoArg,
        #[arg(allow_negative_numbers = true)]
        degree: i32,
        #[command(flatten)]
        ranges: RangeArgs,
    },
    /// Run a DC motor.
    Motor {
        #[arg(value_enum)]
        channel: MotorArg,
        /// Speed in percent (0-100).
        #[arg(allow_negative_numbers = true)]
        percent: i32,
        #[arg(long, value_enum, default_value_t = DirectionArg::Cw)]
        direction: DirectionArg,
    },
    /// Stop a DC motor.
    Stop {
        #[arg(value_enum)]
        channel: MotorArg,
    },
    /// Change the device's I2C address.
    SetAddress {
        #[arg(value_parser = parse_address)]
        new_address: u8,
    },
    /// Print the frame for a command without touching the bus.
    Encode {
        #[command(subcommand)]
        command: EncodeCommand,
    },
    /// Print the effective configuration as JSON.
    ShowConfig,
}

#[derive(Subcommand, Debug)]
enum EncodeCommand {
    Servo {
        #[arg(value_enum)]
        channel: ServoArg,
        #[arg(allow_negative_numbers = true)]
        degree: i32,
        #[command(flatten)]
        ranges: RangeArgs,
    },
    Motor {
        #[arg(value_enum)]
        channel: MotorArg,
        #[arg(allow_negative_numbers = true)]
        percent: i32,
        #[arg(long, value_enum, default_value_t = DirectionArg::Cw)]
        direction: DirectionArg,
    },
    SetAddress {
        #[arg(value_parser = parse_address)]
        new_address: u8,
    },
}

#[derive(clap::Args, Debug)]
struct RangeArgs {
    /// Servo angle range.
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
    degree_range: Option<Vec<i32>>,

    /// Servo pulse width range in microseconds.
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
    pulse_range: Option<Vec<i32>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ServoArg {
    S1,
    S2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum MotorArg {
    Ma,
    Mb,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DirectionArg {
    Cw,
    Ccw,
}

impl From<ServoArg> for ServoChannel {
    fn from(arg: ServoArg) -> Self {
        match arg {
            ServoArg::S1 => ServoChannel::S1,
            ServoArg::S2 => ServoChannel::S2,
        }
    }
}

impl From<MotorArg> for MotorChannel {
    fn from(arg: MotorArg) -> Self {
        match arg {
            MotorArg::Ma => MotorChannel::Ma,
            MotorArg::Mb => MotorChannel::Mb,
        }
    }
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Cw => Direction::Cw,
            DirectionArg::Ccw => Direction::Ccw,
        }
    }
}

/// Accepts hex with a 0x prefix or decimal
fn parse_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

fn apply_ranges<B: Bus>(driver: &mut L9110<B>, ranges: &RangeArgs) -> Result<(), BoxError> {
    if let Some(r) = &ranges.degree_range {
        driver.set_degree_range(r[0], r[1])?;
    }
    if let Some(r) = &ranges.pulse_range {
        driver.set_pulse_range(r[0], r[1])?;
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<DeviceConfig, BoxError> {
    let mut config = match &cli.config {
        Some(path) => DeviceConfig::load(path)?,
        None => DeviceConfig::default(),
    };
    if let Some(address) = cli.address {
        config.address = address;
    }
    Ok(config)
}

#[cfg(target_os = "linux")]
fn open_bus(bus_number: u8) -> Result<Box<dyn Bus>, BoxError> {
    Ok(Box::new(l9110_i2c::motor::bus::linux::open_bus(bus_number)?))
}

#[cfg(not(target_os = "linux"))]
fn open_bus(_bus_number: u8) -> Result<Box<dyn Bus>, BoxError> {
    Err("I2C access is only supported on Linux (use --dry-run)".into())
}

fn encode(config: DeviceConfig, command: EncodeCommand) -> Result<(), BoxError> {
    // Encoding never writes, so a dry-run bus is enough to hold the config
    let mut driver = L9110::with_config(LogBus::new(), config)?;
    let frame = match command {
        EncodeCommand::Servo {
            channel,
            degree,
            ranges,
        } => {
            apply_ranges(&mut driver, &ranges)?;
            driver.encode_servo(channel.into(), degree)?
        }
        EncodeCommand::Motor {
            channel,
            percent,
            direction,
        } => driver.encode_motor(channel.into(), percent, direction.into())?,
        EncodeCommand::SetAddress { new_address } => {
            if !l9110_i2c::config::address_in_window(new_address) {
                return Err(l9110_i2c::DriverError::AddressOutOfRange(new_address).into());
            }
            l9110_i2c::motor::CommandFrame::set_address(new_address)
        }
    };
    println!("{:?}", frame.as_bytes());
    Ok(())
}

fn run(cli: Cli) -> Result<(), BoxError> {
    let config = load_config(&cli)?;

    let command = match cli.command {
        Command::ShowConfig => {
            println!("{}", config.to_json()?);
            return Ok(());
        }
        Command::Encode { command } => return encode(config, command),
        other => other,
    };

    let bus: Box<dyn Bus> = if cli.dry_run {
        Box::new(LogBus::new())
    } else {
        open_bus(cli.bus)?
    };
    let mut driver = L9110::with_config(bus, config)?;

    match command {
        Command::Servo {
            channel,
            degree,
            ranges,
        } => {
            apply_ranges(&mut driver, &ranges)?;
            driver.control_servo(channel.into(), degree)?;
        }
        Command::Motor {
            channel,
            percent,
            direction,
        } => driver.control_motor(channel.into(), percent, direction.into())?,
        Command::Stop { channel } => driver.stop_motor(channel.into())?,
        Command::SetAddress { new_address } => driver.set_address(new_address)?,
        Command::Encode { .. } | Command::ShowConfig => unreachable!("handled above"),
    }

    info!("Command sent to 0x{:02X}", driver.address());
    driver.close()?;
    Ok(())
}

fn main() {
    // Setup logging (set RUST_LOG=debug to see every frame)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
