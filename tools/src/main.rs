//! recon-runner: command-line front end for the reconciliation engine.
//!
//! Usage:
//!   recon-runner --db recon.db --scope orders,fees --triggered-by ops@desk
//!   recon-runner --db recon.db --demo-seed 7 --demo-orders 500
//!   recon-runner --db recon.db --findings <scan_id>
//!   recon-runner --db recon.db --list-detectors
//!   recon-runner --db recon.db --ipc-mode

use anyhow::{bail, Result};
use chrono::Utc;
use recon_core::{
    config::EngineConfig,
    demo_data::seed_demo_ledgers,
    engine::ScanEngine,
    store::ReconStore,
    trigger::{self, ScanRequest, TriggerReply},
};
use std::env;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Scan {
        #[serde(default)]
        scope: Option<Vec<String>>,
        #[serde(default)]
        triggered_by: Option<String>,
    },
    Findings {
        scan_id: String,
    },
    SetFlag {
        enabled: bool,
    },
    Quit,
}

fn main() -> Result<ExitCode> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = string_arg(&args, "--db").unwrap_or("recon.db");
    let config = match string_arg(&args, "--config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let store = ReconStore::open(db)?;
    store.migrate()?;
    let engine = ScanEngine::build(store, config);

    if args.iter().any(|a| a == "--enable") {
        set_flag(&engine, true)?;
        return Ok(ExitCode::SUCCESS);
    }
    if args.iter().any(|a| a == "--disable") {
        set_flag(&engine, false)?;
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(seed) = string_arg(&args, "--demo-seed") {
        let seed: u64 = match seed.parse() {
            Ok(s) => s,
            Err(_) => bail!("--demo-seed expects an unsigned integer, got '{seed}'"),
        };
        let orders = parse_arg(&args, "--demo-orders", 200usize);
        let report = seed_demo_ledgers(&engine.store, seed, orders, Utc::now())?;
        set_flag(&engine, true)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    if args.iter().any(|a| a == "--list-detectors") {
        println!("{}", serde_json::to_string_pretty(&engine.registry().names())?);
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(scan_id) = string_arg(&args, "--findings") {
        let findings = engine.store.findings_for_scan(scan_id)?;
        println!("{}", serde_json::to_string_pretty(&findings)?);
        return Ok(ExitCode::SUCCESS);
    }

    if args.iter().any(|a| a == "--ipc-mode") {
        run_ipc_loop(&engine)?;
        return Ok(ExitCode::SUCCESS);
    }

    let request = ScanRequest {
        scope: string_arg(&args, "--scope").map(|s| {
            s.split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        }),
        triggered_by: string_arg(&args, "--triggered-by").map(str::to_string),
    };
    let reply = trigger::handle(&engine, &request);
    print_reply(&reply)?;

    Ok(if reply.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_ipc_loop(engine: &ScanEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Scan {
                scope,
                triggered_by,
            } => {
                let reply = trigger::handle(engine, &ScanRequest { scope, triggered_by });
                writeln!(stdout, "{}", serde_json::to_string(&reply)?)?;
            }
            IpcCommand::Findings { scan_id } => {
                let line = match engine.store.findings_for_scan(&scan_id) {
                    Ok(findings) => serde_json::json!({ "scan_id": scan_id, "findings": findings }),
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                };
                writeln!(stdout, "{}", line)?;
            }
            IpcCommand::SetFlag { enabled } => {
                set_flag(engine, enabled)?;
                writeln!(stdout, "{}", serde_json::json!({ "enabled": enabled }))?;
            }
        }
        stdout.flush()?;
    }
    Ok(())
}

fn set_flag(engine: &ScanEngine, enabled: bool) -> Result<()> {
    let key = &engine.config().feature_flag_key;
    let value = if enabled { "true" } else { "false" };
    engine
        .store
        .set_setting(key, value, Utc::now().timestamp_millis())?;
    log::info!("feature flag '{key}' set to {value}");
    Ok(())
}

fn print_reply(reply: &TriggerReply) -> Result<()> {
    let json = serde_json::to_string_pretty(reply)?;
    if reply.is_success() {
        println!("{json}");
    } else {
        eprintln!("{json}");
    }
    Ok(())
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
