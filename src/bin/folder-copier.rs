use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use folder_copier_lib::copy_engine::{OperationPhase, PreservingCopier, ProgressEvent};
use folder_copier_lib::logging::{init_tracing, LogManager};
use folder_copier_lib::network_probe::{PingProbe, TcpProbe};
use folder_copier_lib::settings::{FolderType, SETTINGS_FILE};
use folder_copier_lib::{
    CancelPolicy, CopyHandle, CopyRequest, FolderCopier, OperationResult, Placement,
    SettingsStore, TerminalState,
};

#[derive(Clone, Copy, ValueEnum)]
enum ProbeKind {
    /// Connect to the SMB ports (445, 139)
    Tcp,
    /// Send one ICMP echo with the system ping
    Ping,
}

#[derive(Parser)]
#[command(name = "folder-copier")]
#[command(about = "Replace a destination folder with a fresh copy, keeping the previous one as <destination>_old", long_about = None)]
struct Cli {
    /// Settings file (JSON); missing keys fall back to defaults
    #[arg(long, default_value = SETTINGS_FILE)]
    settings: PathBuf,

    #[arg(short, long)]
    source: Option<PathBuf>,

    #[arg(short, long)]
    destination: Option<PathBuf>,

    /// Treat the destination as a network share and probe this host first
    #[arg(long)]
    network_host: Option<String>,

    /// Copy to <destination>/<source folder name> instead of <destination>
    #[arg(long)]
    nested: bool,

    /// On Ctrl-C, put the previous destination back instead of keeping the partial copy
    #[arg(long)]
    restore_on_cancel: bool,

    #[arg(long, value_enum, default_value = "tcp")]
    probe: ProbeKind,

    /// Persist the effective settings back to the settings file
    #[arg(long)]
    write_settings: bool,

    /// Also write logs to rotating files in this directory (e.g. ./logs)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, action = clap::ArgAction::Count)]
    quiet: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    // Dropped on return, flushing the log file.
    let _log_guard = init_tracing(
        (cli.verbose as i8).saturating_sub(cli.quiet as i8),
        cli.log_dir.as_deref(),
    )?;

    let store = SettingsStore::new(&cli.settings);
    let mut settings = store.load();

    if let Some(source) = &cli.source {
        settings.source_path = source.to_string_lossy().to_string();
    }
    if let Some(destination) = &cli.destination {
        settings.destination_path = destination.to_string_lossy().to_string();
    }
    if let Some(host) = &cli.network_host {
        settings.folder_type = FolderType::Network;
        settings.network_ip = host.clone();
    }
    if cli.nested {
        settings.placement = Placement::Nested;
    }
    if cli.restore_on_cancel {
        settings.cancel_policy = CancelPolicy::Restore;
    }

    if cli.write_settings {
        store.save(&settings)?;
        println!("💾 Settings written to {}", store.path().display());
    }

    if settings.source_path.is_empty() || settings.destination_path.is_empty() {
        anyhow::bail!(
            "Please configure source and destination folders (--source/--destination or {})",
            store.path().display()
        );
    }

    let request = CopyRequest::from_settings(&settings)?;

    println!("🚀 Starting copy...");
    println!("   Source: {}", request.source.display());
    println!("   Destination: {}", request.target()?.display());
    if let Some(host) = &request.network_host {
        println!("   Network host: {host}");
    }
    println!();

    let log_manager = std::sync::Arc::new(LogManager::default());
    let result = match cli.probe {
        ProbeKind::Tcp => {
            let copier =
                FolderCopier::with_parts(TcpProbe::default(), PreservingCopier, log_manager);
            let handle = copier.start_copy(request)?;
            drive(handle).await
        }
        ProbeKind::Ping => {
            let copier =
                FolderCopier::with_parts(PingProbe::default(), PreservingCopier, log_manager);
            let handle = copier.start_copy(request)?;
            drive(handle).await
        }
    };

    println!();
    let code = match result.state {
        TerminalState::Succeeded => {
            println!("✅ {}", result.message);
            println!("   Files copied: {}", result.files_copied);
            ExitCode::SUCCESS
        }
        TerminalState::Cancelled => {
            println!("⏹️  {}", result.message);
            ExitCode::from(2)
        }
        TerminalState::FailedUnrestored if result.is_fatal() => {
            eprintln!("🛑 {}", result.message);
            eprintln!("   Manual recovery is required.");
            ExitCode::FAILURE
        }
        _ => {
            eprintln!("❌ {}", result.message);
            ExitCode::FAILURE
        }
    };

    Ok(code)
}

/// Render progress until the operation ends. Ctrl-C requests cancellation.
async fn drive(handle: CopyHandle) -> OperationResult {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(120));

    let mut progress = handle.progress();
    let mut progress_open = true;
    let token = handle.cancel_token();
    let mut cancel_requested = false;

    let wait = handle.wait();
    tokio::pin!(wait);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut wait => {
                match result.state {
                    TerminalState::Succeeded => pb.finish_with_message("Copy complete"),
                    _ => pb.abandon_with_message("Copy stopped"),
                }
                return result;
            }
            _ = &mut ctrl_c, if !cancel_requested => {
                cancel_requested = true;
                token.cancel();
                pb.set_message("Cancelling after the current file...");
            }
            changed = progress.changed(), if progress_open => {
                if changed.is_err() {
                    progress_open = false;
                    continue;
                }
                let event = progress.borrow_and_update().clone();
                render(&pb, &event);
            }
        }
    }
}

fn render(pb: &ProgressBar, event: &ProgressEvent) {
    match event.phase {
        OperationPhase::Copying if event.files_total > 0 => {
            if pb.length() != Some(event.files_total) {
                pb.set_length(event.files_total);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                {
                    pb.set_style(style.progress_chars("#>-"));
                }
            }
            pb.set_position(event.files_copied);
            pb.set_message(event.current_item.clone());
        }
        OperationPhase::Copying => pb.set_message(event.status_text()),
        _ => pb.set_message(event.phase_message.clone()),
    }
}
