use bytes::BytesMut;
use crcline_frame::{encode_frame, Crc16};

use crate::cmd::{ChecksumArgs, Variant};
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_checksum, ChecksumOutput, OutputFormat};

pub fn run(args: ChecksumArgs, format: OutputFormat) -> CliResult<i32> {
    let out = compute(&args)?;
    print_checksum(&out, format);
    Ok(SUCCESS)
}

fn compute(args: &ChecksumArgs) -> CliResult<ChecksumOutput> {
    let algorithm = match args.variant {
        Variant::Xmodem => Crc16::Xmodem,
        Variant::Ccitt => Crc16::Ccitt,
    };
    let payload = args.data.as_bytes();
    let checksum = algorithm.compute(payload);

    let frame = if args.frame {
        if algorithm != Crc16::Xmodem {
            return Err(CliError::new(
                USAGE,
                "--frame is only defined for the xmodem variant",
            ));
        }
        let mut dst = BytesMut::new();
        encode_frame(payload, b'\n', &mut dst).map_err(|err| frame_error("frame failed", err))?;
        // Shown without its terminator.
        Some(String::from_utf8_lossy(&dst[..dst.len() - 1]).into_owned())
    } else {
        None
    };

    Ok(ChecksumOutput {
        algorithm: algorithm.name(),
        payload: args.data.clone(),
        checksum,
        checksum_hex: format!("0x{checksum:04X}"),
        frame,
    })
}
