//! `fip-masterd`: a runnable consumer of the master dialogue engine
//! (`spec.md` §6 "CLI of master").
//!
//! Loads the enabled interop modules from a TOML config, spawns and
//! handshakes with each, runs one compile round for the host target, and
//! shuts everything down.
//!
//! # Exit codes
//!
//! - 0: compile round succeeded
//! - 1: a handshake or version-mismatch failure
//! - 2: a fatal transport/config error before any module was spawned

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use fip_master::MasterState;
use fip_proto::{KillReason, TargetTriple};

#[derive(Parser, Debug)]
#[command(name = "fip-masterd")]
#[command(about = "Flint Interop Protocol master process")]
struct Args {
    /// Path to the master configuration file.
    #[arg(long, default_value = ".fip/config/fip.toml")]
    config: PathBuf,

    /// Root directory interop modules are spawned from.
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    /// Raise the log level passed to every spawned module.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    fip_log::init("master");
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };

    let enabled = match fip_config::load_enabled_modules(&args.config, fip_proto::FIP_MAX_SLAVES) {
        Ok(modules) => modules,
        Err(e) => {
            tracing::error!("failed to load config {}: {e}", args.config.display());
            std::process::exit(2);
        }
    };

    if enabled.is_empty() {
        tracing::warn!("no interop modules enabled in {}", args.config.display());
    }

    let mut state = MasterState::new();
    for (index, module_name) in enabled.iter().enumerate() {
        let program = args.project_root.join(".fip").join("bin").join(module_name);
        let program = program.to_string_lossy().into_owned();
        let result = state
            .spawn_module(
                module_name,
                &program,
                &[index.to_string(), log_level.to_string()],
            )
            .await;
        if let Err(e) = result {
            tracing::error!("{e}");
            state.shutdown(KillReason::Finish, Duration::from_millis(100)).await;
            std::process::exit(1);
        }
    }

    let result = state.compile_request(host_target()).await;
    state.shutdown(KillReason::Finish, Duration::from_millis(100)).await;

    if result.succeeded {
        tracing::info!(objects = result.paths.len(), "compile round succeeded");
        std::process::exit(0);
    } else {
        tracing::error!(faulty = ?result.faulty_modules, "compile round failed");
        std::process::exit(1);
    }
}

/// The host's own target triple (`spec.md` §3.3, tag 4 — the triple is an
/// input `fip-masterd` must supply, not something the protocol derives on
/// its own), approximated from `std::env::consts` since deriving the exact
/// `rustc` target triple needs a build script this binary doesn't carry.
fn host_target() -> TargetTriple {
    TargetTriple {
        arch: std::env::consts::ARCH.to_string(),
        sub: String::new(),
        vendor: "unknown".to_string(),
        sys: std::env::consts::OS.to_string(),
        abi: std::env::consts::FAMILY.to_string(),
    }
}
