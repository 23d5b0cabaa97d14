use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct LineOutput<'a> {
    kind: &'static str,
    port: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix: Option<&'a str>,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

/// Print one received payload (checksum and prefix already stripped).
pub fn print_line(payload: &[u8], port: &str, prefix: Option<&str>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = LineOutput {
                kind: "line-received",
                port,
                prefix,
                payload_size: payload.len(),
                payload: payload_preview(payload),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "PREFIX", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    port.to_string(),
                    prefix.unwrap_or("-").to_string(),
                    payload.len().to_string(),
                    payload_preview(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "port={} prefix={} size={} payload={}",
                port,
                prefix.unwrap_or("-"),
                payload.len(),
                payload_preview(payload)
            );
        }
        OutputFormat::Raw => {
            print_raw(payload);
            print_raw(b"\n");
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChecksumOutput {
    pub algorithm: &'static str,
    pub payload: String,
    pub checksum: u16,
    pub checksum_hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,
}

pub fn print_checksum(out: &ChecksumOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ALGORITHM", "CHECKSUM", "HEX", "PAYLOAD"])
                .add_row(vec![
                    out.algorithm.to_string(),
                    out.checksum.to_string(),
                    out.checksum_hex.clone(),
                    out.payload.clone(),
                ]);
            println!("{table}");
            if let Some(frame) = &out.frame {
                println!("frame: {frame}");
            }
        }
        OutputFormat::Pretty => {
            println!(
                "algorithm={} checksum={} hex={} payload={}",
                out.algorithm, out.checksum, out.checksum_hex, out.payload
            );
            if let Some(frame) = &out.frame {
                println!("frame={frame}");
            }
        }
        OutputFormat::Raw => match &out.frame {
            Some(frame) => println!("{frame}"),
            None => println!("{}", out.checksum),
        },
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
