//! `robodash-cli` – RoboDash command line interface
//!
//! This binary is the entry point for the teleoperation dashboard.  It:
//!
//! 1. Loads `~/.robodash/config.toml`, writing defaults on first run.
//! 2. Starts the dashboard loop against the hosted database, or against the
//!    demo generator when no database is configured.
//! 3. Serves the browser cockpit on the configured web UI port.
//! 4. Drops the user into an interactive REPL for terminal teleoperation.
//! 5. Intercepts **Ctrl-C** to lower the presence beacon and exit.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use tracing::{error, info, warn};

use robodash_cockpit::{CockpitServer, FilePreferences, ThemeController};
use robodash_middleware::{EventBus, FirebaseStore, RemoteStore};
use robodash_runtime::{Dashboard, DashboardHandle};
use robodash_types::DashError;

use crate::config::Config;

fn main() {
    // Held for the whole process; flushes exported spans on drop.
    let _telemetry = robodash_runtime::init_tracing("robodash");

    print_banner();

    if let Err(e) = run() {
        error!(error = %e, "CRITICAL: App failed to start.");
        eprintln!("{} {}", "CRITICAL: App failed to start.".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), DashError> {
    let cfg = load_config();
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| DashError::Config(format!("failed to start async runtime: {e}")))?;
    runtime.block_on(serve(cfg))
}

async fn serve(cfg: Config) -> Result<(), DashError> {
    let store: Option<Arc<dyn RemoteStore>> = cfg
        .firebase()
        .map(|firebase| Arc::new(FirebaseStore::new(firebase)) as Arc<dyn RemoteStore>);
    if store.is_none() {
        println!("  {}", "No database configured – running in demo mode.".yellow());
    }

    let (dashboard, handle) = Dashboard::new(cfg.dashboard_config(), store, EventBus::default());

    let prefs = FilePreferences::new(cfg.preferences_path());
    let theme = Arc::new(ThemeController::load(Box::new(prefs)));
    let server = CockpitServer::new(handle.clone(), theme).with_port(cfg.webui_port);
    let listener = server.bind().await?;
    tokio::spawn(server.serve(listener));

    install_ctrlc(handle.clone());

    let dashboard_task = tokio::spawn(dashboard.run());

    println!(
        "  Cockpit at {}",
        format!("http://localhost:{}", cfg.webui_port).bold()
    );
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // Detached: the process exits once the loop has stopped, even if the
    // REPL is still blocked on input.
    let repl_handle = handle.clone();
    std::thread::Builder::new()
        .name("robodash-repl".to_string())
        .spawn(move || repl::run(repl_handle))
        .map_err(|e| DashError::Config(format!("failed to start REPL: {e}")))?;

    drop(handle);
    dashboard_task
        .await
        .map_err(|e| DashError::Channel(format!("dashboard task failed: {e}")))?;
    info!("dashboard stopped");
    println!("{}", "  ✓ Exiting RoboDash.".green());
    Ok(())
}

fn install_ctrlc(handle: DashboardHandle) {
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        if let Err(e) = handle.request_shutdown() {
            warn!(error = %e, "dashboard already stopped");
        }
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }
}

/// Load the config, writing defaults on first run.
fn load_config() -> Config {
    match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let mut cfg = Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

fn print_banner() {
    println!();
    println!("{}", r#"   ___       __        ___           __ "#.bold().cyan());
    println!("{}", r#"  / _ \___  / /  ___  / _ \___ ____ / / "#.bold().cyan());
    println!("{}", r#" / , _/ _ \/ _ \/ _ \/ // / _ `(_-</ _ \"#.bold().cyan());
    println!("{}", r#"/_/|_|\___/_.__/\___/____/\_,_/___/_//_/"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "RoboDash".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Remote robot teleoperation dashboard");
    println!();
}
