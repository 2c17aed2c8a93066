//! Storage probe.
//!
//! Usage: `kashtanka_cli [probe | card <namespace> <local_id>]`
//!
//! Storage is selected from `STORAGE_ADDRS` / `KEYSPACE`; logs go to
//! `LOG_DIR` (default: a `kashtanka-logs` temp directory) at `LOG_LEVEL`.

use kashtanka_core::{default_log_level, init_logging, open_storage, Identifier, StorageConfig};
use log::error;
use std::process::ExitCode;

enum Command {
    Probe,
    Card { ns: String, local_id: String },
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Command, String> {
    match args.next().as_deref() {
        None | Some("probe") => Ok(Command::Probe),
        Some("card") => match (args.next(), args.next()) {
            (Some(ns), Some(local_id)) => Ok(Command::Card { ns, local_id }),
            _ => Err("usage: kashtanka_cli card <namespace> <local_id>".to_string()),
        },
        Some(other) => Err(format!(
            "unknown command `{other}`; expected `probe` or `card <namespace> <local_id>`"
        )),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| default_log_level().to_string());
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| {
        std::env::temp_dir()
            .join("kashtanka-logs")
            .display()
            .to_string()
    });
    if let Err(err) = init_logging(&level, &log_dir) {
        eprintln!("logging disabled: {err}");
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_run module=cli status=error error={message}");
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), String> {
    let command = parse_args(std::env::args().skip(1))?;
    let config = StorageConfig::from_env().map_err(|err| err.to_string())?;
    let storage = open_storage(config);

    match command {
        Command::Probe => {
            storage.ready().await.map_err(|err| err.to_string())?;
            println!("storage ready backend={}", storage.backend());
            println!("kashtanka_core version={}", kashtanka_core::core_version());
        }
        Command::Card { ns, local_id } => {
            let ns = Identifier::new(&ns).map_err(|err| err.to_string())?;
            let local_id = Identifier::new(&local_id).map_err(|err| err.to_string())?;
            let card = storage
                .card_service()
                .get_card(&ns, &local_id, false)
                .await
                .map_err(|err| err.to_string())?;
            match card {
                Some(card) => {
                    let json =
                        serde_json::to_string_pretty(&card).map_err(|err| err.to_string())?;
                    println!("{json}");
                }
                None => return Err(format!("card {ns}/{local_id} not found")),
            }
        }
    }
    Ok(())
}
