use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scriptnav_lib::language_service::{
    definition_location, FileEvent, GotoOutcome, IndexEvent, LanguageService, Position,
};
use scriptnav_lib::protocol::{dispatch, Request, Response};

#[derive(Parser, Debug)]
#[command(
    name = "scriptnav",
    version,
    about = "Symbol index and heuristic navigation for JavaScript/TypeScript workspaces"
)]
struct Cli {
    /// Workspace root
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rebuild the symbol index from scratch
    Index,
    /// Jump to the definition of the identifier at a position
    Goto {
        #[command(flatten)]
        cursor: CursorArgs,
        /// Take the Nth candidate (0-based) when the lookup is ambiguous
        #[arg(long)]
        pick: Option<usize>,
    },
    /// List call sites of the function at a position
    References {
        #[command(flatten)]
        cursor: CursorArgs,
    },
    /// Member completions after a `.`
    Complete {
        #[command(flatten)]
        cursor: CursorArgs,
    },
    /// Signature of the call being typed
    Signature {
        #[command(flatten)]
        cursor: CursorArgs,
    },
    /// JSON-lines request loop on stdin/stdout with file watching
    Serve,
}

#[derive(Args, Debug)]
struct CursorArgs {
    file: PathBuf,
    /// 1-based line
    line: usize,
    /// 1-based column
    col: usize,
}

impl CursorArgs {
    fn position(&self) -> Position {
        Position::new(self.line.saturating_sub(1), self.col.saturating_sub(1))
    }
}

enum ServeEvent {
    Request(Request),
    Invalid(String),
    Files(Vec<FileEvent>),
    InputClosed,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("scriptnav=info,scriptnav_lib=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut service = LanguageService::new(cli.workspace)?;

    match cli.command {
        Commands::Index => {
            let symbols = service.rebuild_index(|event| {
                if let IndexEvent::FileFailed { path, error } = event {
                    warn!("[Index] {}: {}", path, error);
                }
            })?;
            println!(
                "Indexed {} symbols from {} files",
                symbols,
                service.stats().files_indexed
            );
        }
        Commands::Goto { cursor, pick } => {
            let document = service.open_document(&cursor.file)?;
            let outcome = service.goto_definition(&document, cursor.position())?;
            match (outcome, pick) {
                (GotoOutcome::Choose { candidates, .. }, Some(index)) => {
                    let record = candidates.get(index).ok_or_else(|| {
                        format!("No candidate {} (have {})", index, candidates.len())
                    })?;
                    print_json(&definition_location(record))?;
                }
                (outcome, _) => print_json(&outcome)?,
            }
        }
        Commands::References { cursor } => {
            let document = service.open_document(&cursor.file)?;
            let outcome =
                service.find_references_at_cursor(&document, cursor.position(), |_, _| {});
            print_json(&outcome)?;
        }
        Commands::Complete { cursor } => {
            let document = service.open_document(&cursor.file)?;
            print_json(&service.completions(&document, cursor.position()))?;
        }
        Commands::Signature { cursor } => {
            let document = service.open_document(&cursor.file)?;
            print_json(&service.signature_help(&document, cursor.position()))?;
        }
        Commands::Serve => serve(service)?,
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Requests and watcher batches share one channel so each runs to completion
/// before the next is looked at
fn serve(mut service: LanguageService) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, rx) = mpsc::channel();

    let watcher_tx = tx.clone();
    let _watcher = match service.watch(move |batch| {
        let _ = watcher_tx.send(ServeEvent::Files(batch));
    }) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("[Serve] File watching disabled: {}", e);
            None
        }
    };

    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            let event = match serde_json::from_str::<Request>(&line) {
                Ok(request) => ServeEvent::Request(request),
                Err(e) => ServeEvent::Invalid(format!("invalid request: {}", e)),
            };
            if tx.send(event).is_err() {
                return;
            }
        }
        let _ = tx.send(ServeEvent::InputClosed);
    });

    info!("[Serve] Ready on {}", service.workspace_root().display());

    let mut emit = |response: Response| write_response(&response);
    for event in rx {
        match event {
            ServeEvent::Request(request) => {
                if !dispatch(&mut service, request, &mut emit) {
                    break;
                }
            }
            ServeEvent::Invalid(message) => emit(Response::Error { message }),
            ServeEvent::Files(batch) => {
                for file_event in batch {
                    match service.handle_file_event(&file_event) {
                        Ok(true) => emit(Response::IndexUpdated {
                            path: display_path(&service, file_event.path()),
                        }),
                        Ok(false) => {}
                        Err(e) => emit(Response::error(e)),
                    }
                }
            }
            ServeEvent::InputClosed => break,
        }
    }

    info!("[Serve] Stopped");
    Ok(())
}

fn display_path(service: &LanguageService, path: &Path) -> String {
    service
        .relative_path(path)
        .unwrap_or_else(|_| path.display().to_string())
}

fn write_response(response: &Response) {
    let line = match serde_json::to_string(response) {
        Ok(line) => line,
        Err(e) => {
            warn!("[Serve] Failed to encode response: {}", e);
            return;
        }
    };
    let mut stdout = io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{}", line).and_then(|_| stdout.flush()) {
        warn!("[Serve] Failed to write response: {}", e);
    }
}
