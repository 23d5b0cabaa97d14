use std::fs;

use tracing::debug;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{io_error, link_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_line, OutputFormat};

/// Largest response `--wait` will accept, terminator included.
const RESPONSE_BUFFER: usize = 256;

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let wait = args.wait || args.prefix.is_some();
    let wait_timeout = parse_duration(&args.wait_timeout)?;

    let mut conn = args.port.connect()?;
    conn.send_data(&payload)
        .map_err(|err| link_error("send failed", err))?;
    debug!(port = %args.port.port, size = payload.len(), "line sent");

    if !wait {
        return Ok(SUCCESS);
    }

    let mut buf = [0u8; RESPONSE_BUFFER];
    let received = match &args.prefix {
        Some(prefix) => conn.receive_data_with_prefix(prefix.as_bytes(), &mut buf, wait_timeout),
        None => conn.receive_data(&mut buf, wait_timeout),
    }
    .map_err(|err| link_error("receive failed", err))?;

    print_line(
        &buf[..received],
        &args.port.port,
        args.prefix.as_deref(),
        format,
    );
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        let mut bytes = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        trim_line_ending(&mut bytes);
        return Ok(bytes);
    }
    Err(CliError::new(USAGE, "one of --data or --file is required"))
}

/// Drop one trailing LF or CR LF, as left by most editors.
fn trim_line_ending(bytes: &mut Vec<u8>) {
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
    }
}
