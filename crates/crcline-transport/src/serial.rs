use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::IoStream;

/// A UART opened through the `serialport` crate.
pub type SerialStream = IoStream<Box<dyn SerialPort>>;

/// Read timeout used for polling; an idle read returns `TimedOut` after this.
const POLL_TIMEOUT: Duration = Duration::from_millis(1);

/// Open a serial device at `baud_rate` (8N1, no flow control).
pub fn open_serial(path: &str, baud_rate: u32) -> Result<SerialStream> {
    let port = serialport::new(path, baud_rate)
        .timeout(POLL_TIMEOUT)
        .open()
        .map_err(|source| TransportError::Open {
            path: path.to_string(),
            source,
        })?;

    info!(path, baud_rate, "opened serial port");
    Ok(IoStream::new(port))
}

/// Names of the serial devices present on this machine.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(|source| TransportError::Open {
        path: "<enumerate>".to_string(),
        source,
    })?;
    debug!(count = ports.len(), "enumerated serial ports");
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
