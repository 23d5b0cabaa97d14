use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use crcline_frame::OverflowPolicy;
use crcline_link::{Connection, LinkConfig, TracingSink};
use crcline_transport::{open_serial, SerialStream};

use crate::exit::{transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod checksum;
pub mod listen;
pub mod ports;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one checksummed line.
    Send(SendArgs),
    /// Print every valid line received.
    Listen(ListenArgs),
    /// Compute a CRC16 or render a frame without touching a port.
    Checksum(ChecksumArgs),
    /// List serial ports on this machine.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

impl Command {
    /// True when the command opens a port with `--diag`.
    pub fn diag_enabled(&self) -> bool {
        match self {
            Command::Send(args) => args.port.diag,
            Command::Listen(args) => args.port.diag,
            Command::Checksum(_) | Command::Ports(_) | Command::Version(_) => false,
        }
    }
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Checksum(args) => checksum::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Output line terminator.
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum Eol {
    #[default]
    Lf,
    Cr,
}

impl Eol {
    pub fn byte(self) -> u8 {
        match self {
            Eol::Lf => b'\n',
            Eol::Cr => b'\r',
        }
    }
}

#[derive(Args, Debug)]
pub struct PortArgs {
    /// Serial device (e.g. /dev/ttyUSB0, COM3).
    #[arg(env = "CRCLINE_PORT")]
    pub port: String,
    /// Baud rate.
    #[arg(long, short = 'b', env = "CRCLINE_BAUD", default_value = "115200")]
    pub baud: u32,
    /// Terminator for outgoing lines.
    #[arg(long, value_enum, default_value = "lf")]
    pub eol: Eol,
    /// Reject lines longer than the receive buffer instead of truncating them.
    #[arg(long)]
    pub reject_overflow: bool,
    /// Echo protocol diagnostics to the stderr log (target `crcline::diag`).
    #[arg(long)]
    pub diag: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Payload text.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read the payload from a file (trailing newline is dropped).
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Wait for one valid response line and print it.
    #[arg(long)]
    pub wait: bool,
    /// Only accept a response starting with this prefix (implies --wait).
    #[arg(long)]
    pub prefix: Option<String>,
    /// Maximum time to wait for a response (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub port: PortArgs,
    /// Only print lines starting with this prefix (the prefix is stripped).
    #[arg(long)]
    pub prefix: Option<String>,
    /// Exit after receiving N lines (N >= 1).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub count: Option<u64>,
    /// Exit with a timeout error if no line arrives within this time (e.g. 5s).
    #[arg(long)]
    pub timeout: Option<String>,
    /// Receive buffer size in bytes, terminator included.
    #[arg(long, default_value = "256")]
    pub buffer: usize,
}

/// CRC16 variant selectable from the command line.
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum Variant {
    #[default]
    Xmodem,
    Ccitt,
}

#[derive(Args, Debug)]
pub struct ChecksumArgs {
    /// Payload text.
    #[arg(long)]
    pub data: String,
    /// CRC16 variant.
    #[arg(long, value_enum, default_value = "xmodem")]
    pub variant: Variant,
    /// Also render the complete wire frame (XMODEM only).
    #[arg(long)]
    pub frame: bool,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

impl PortArgs {
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            eol: self.eol.byte(),
            overflow: if self.reject_overflow {
                OverflowPolicy::Reject
            } else {
                OverflowPolicy::Truncate
            },
            ..LinkConfig::default()
        }
    }

    /// Open the serial device and bind a connection to it.
    pub fn connect(&self) -> CliResult<Connection<SerialStream>> {
        let stream = open_serial(&self.port, self.baud)
            .map_err(|err| transport_error("open failed", err))?;
        let mut conn = Connection::with_config(
            stream,
            crcline_transport::SystemClock::new(),
            self.link_config(),
        );
        if self.diag {
            conn.set_diag(TracingSink::new());
        }
        Ok(conn)
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn port_args_build_link_config() {
        let args = PortArgs {
            port: "/dev/null".to_string(),
            baud: 9600,
            eol: Eol::Cr,
            reject_overflow: true,
            diag: false,
        };
        let config = args.link_config();
        assert_eq!(config.eol, b'\r');
        assert_eq!(config.overflow, OverflowPolicy::Reject);
        assert_eq!(config.default_timeout, LinkConfig::default().default_timeout);
    }
}
