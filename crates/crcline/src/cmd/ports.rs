use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use crcline_transport::list_ports;
use serde::Serialize;

use crate::cmd::PortsArgs;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct PortsOutput {
    kind: &'static str,
    ports: Vec<String>,
}

pub fn run(_args: PortsArgs, format: OutputFormat) -> CliResult<i32> {
    let ports = list_ports().map_err(|err| transport_error("port enumeration failed", err))?;

    match format {
        OutputFormat::Json => {
            let out = PortsOutput {
                kind: "serial-ports",
                ports,
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
                .set_header(vec!["PORT"]);
            for port in &ports {
                table.add_row(vec![port.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for port in &ports {
                println!("{port}");
            }
        }
    }

    Ok(SUCCESS)
}
