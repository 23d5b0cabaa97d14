use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crcline_link::LinkError;
use tracing::info;

use crate::cmd::{parse_duration, ListenArgs};
use crate::exit::{link_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_line, OutputFormat};

/// How long each receive attempt blocks before the stop flag is rechecked.
const POLL_SLICE: Duration = Duration::from_millis(250);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    if args.buffer < 2 {
        return Err(CliError::new(USAGE, "--buffer must be at least 2 bytes"));
    }
    let idle_limit = args.timeout.as_deref().map(parse_duration).transpose()?;

    let mut conn = args.port.connect()?;
    let drained = conn
        .flush_input()
        .map_err(|err| link_error("flush failed", err))?;
    info!(port = %args.port.port, drained, "listening");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut buf = vec![0u8; args.buffer];
    let mut printed = 0u64;
    let mut last_line = Instant::now();

    while running.load(Ordering::SeqCst) {
        let slice = match idle_limit {
            Some(limit) => {
                let left = limit.saturating_sub(last_line.elapsed());
                if left.is_zero() {
                    return Err(CliError::new(
                        TIMEOUT,
                        format!("no line received within {limit:?}"),
                    ));
                }
                left.min(POLL_SLICE)
            }
            None => POLL_SLICE,
        };

        let received = match &args.prefix {
            Some(prefix) => conn.receive_data_with_prefix(prefix.as_bytes(), &mut buf, slice),
            None => conn.receive_data(&mut buf, slice),
        };

        let len = match received {
            Ok(len) => len,
            Err(LinkError::Timeout(_)) => continue,
            Err(err) => return Err(link_error("receive failed", err)),
        };

        print_line(&buf[..len], &args.port.port, args.prefix.as_deref(), format);
        printed = printed.saturating_add(1);
        last_line = Instant::now();

        if let Some(count) = args.count {
            if printed >= count {
                return Ok(SUCCESS);
            }
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
