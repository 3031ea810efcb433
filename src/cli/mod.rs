//! Command-line interface: argument parsing, prompting, and dispatch.

pub mod render;

use std::sync::Arc;
use std::time::Duration;

use console::Term;

use crate::api::{build_http_client, JellyfinClient, MediaServer};
use crate::config::{DownloadOptions, ServerConfig};
use crate::download::Downloader;
use crate::error::{Error, Result};
use crate::fs::TokioFileSystem;
use crate::model::MediaItem;
use crate::plan;
use crate::progress::ProgressTracker;

use render::{run_render_loop, ProgressRenderer, SilentRenderer, TermRenderer};

const DEFAULT_ADDRESS: &str = "http://localhost:8096";
const DEFAULT_USERNAME: &str = "admin";
const RENDER_TICK: Duration = Duration::from_millis(500);

fn print_usage() {
    eprintln!("Usage: jelly <COMMAND> [OPTIONS]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  connect [--clear-credentials|-c]");
    eprintln!("      Connect to the media server, prompting for credentials if needed");
    eprintln!("  list [--libraries|-l] [--recurse|-r] [<id>]");
    eprintln!("      List libraries, or the children of an item");
    eprintln!("  info <id>");
    eprintln!("      Print an item's metadata as JSON");
    eprintln!("  download <id> [destination] [--force|-f] [--throttle|-t <N>]");
    eprintln!("      Download an item, or every child of a collection");
    eprintln!();
    eprintln!("  -h, --help          Show this help");
}

/// Parses the process arguments and runs the selected command.
///
/// Returns the process exit code: 0 on success, 404 when the requested item
/// does not exist, 1 for a destination conflict or failed downloads, 2 for
/// connection or authentication failures.
pub async fn run() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match dispatch(&args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            e.exit_code()
        }
    }
}

async fn dispatch(args: &[String]) -> Result<i32> {
    let Some(command) = args.first() else {
        print_usage();
        return Ok(0);
    };
    match command.as_str() {
        "connect" => run_connect(&args[1..]).await,
        "list" => run_list(&args[1..]).await,
        "info" => run_info(&args[1..]).await,
        "download" => run_download(&args[1..]).await,
        "-h" | "--help" => {
            print_usage();
            Ok(0)
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            Ok(1)
        }
    }
}

/// Loads cached credentials, prompting for any missing field and saving the
/// answers back to the cache file.
fn load_credentials(clear: bool) -> Result<ServerConfig> {
    let path = ServerConfig::default_path();
    if clear {
        ServerConfig::clear(&path)?;
    }
    let mut config = ServerConfig::load(&path)?;
    if !config.is_complete() {
        prompt_missing(&mut config)?;
        config.save(&path)?;
    }
    Ok(config)
}

fn prompt_missing(config: &mut ServerConfig) -> Result<()> {
    let term = Term::stderr();
    if config.address.is_none() {
        term.write_str(&format!("Server address (default: {DEFAULT_ADDRESS}): "))?;
        let input = term.read_line()?;
        let input = input.trim();
        config.address = Some(if input.is_empty() {
            DEFAULT_ADDRESS.to_string()
        } else {
            input.to_string()
        });
    }
    if config.username.is_none() {
        term.write_str(&format!("Username (default: {DEFAULT_USERNAME}): "))?;
        let input = term.read_line()?;
        let input = input.trim();
        config.username = Some(if input.is_empty() {
            DEFAULT_USERNAME.to_string()
        } else {
            input.to_string()
        });
    }
    if config.password.is_none() {
        term.write_str("Password: ")?;
        config.password = Some(term.read_secure_line()?);
    }
    Ok(())
}

/// Validates the server and authenticates, returning a ready client.
async fn connect_client(config: ServerConfig, quiet: bool) -> Result<JellyfinClient> {
    let client = JellyfinClient::new(build_http_client()?, config);
    let info = client.connect().await?;
    if !quiet {
        println!("Connected to {}", client.base_url());
        if let Some(name) = &info.server_name {
            println!("Server Name: {name}");
        }
        if let Some(version) = &info.version {
            println!("Server Version: {version}");
        }
    }
    let user = client.authenticate().await?;
    if !quiet {
        println!("Authentication success.");
        if let Some(name) = user {
            println!("Welcome, {name}");
        }
    }
    Ok(client)
}

async fn run_connect(args: &[String]) -> Result<i32> {
    let clear = args
        .iter()
        .any(|a| a == "--clear-credentials" || a == "-c");
    let config = load_credentials(clear)?;
    connect_client(config, false).await?;
    Ok(0)
}

fn kind_of(item: &MediaItem) -> &str {
    item.kind.as_deref().unwrap_or("Unknown")
}

fn print_tree(parent_id: &str, all: &[MediaItem], depth: usize) {
    for child in all
        .iter()
        .filter(|c| c.parent_id.as_deref() == Some(parent_id))
    {
        println!(
            "{}{} (ID: {}) - {}",
            "\t".repeat(depth),
            child.name,
            child.id,
            kind_of(child)
        );
        print_tree(&child.id, all, depth + 1);
    }
}

async fn run_list(args: &[String]) -> Result<i32> {
    let mut libraries = false;
    let mut recurse = false;
    let mut id = None;
    for arg in args {
        match arg.as_str() {
            "--libraries" | "-l" => libraries = true,
            "--recurse" | "-r" => recurse = true,
            other if !other.starts_with('-') => id = Some(other.to_string()),
            other => {
                eprintln!("Unknown option: {other}");
                return Ok(1);
            }
        }
    }

    let client = connect_client(load_credentials(false)?, true).await?;

    if libraries {
        for lib in client.user_views().await? {
            println!(
                "Library: {} (ID: {}) - {}",
                lib.name,
                lib.id,
                lib.collection_type.as_deref().unwrap_or("unknown")
            );
        }
        return Ok(0);
    }

    let Some(id) = id else {
        eprintln!("Usage: jelly list [--libraries|-l] [--recurse|-r] [<id>]");
        return Ok(1);
    };
    let Some(parent) = client.item(&id).await? else {
        return Err(Error::ItemNotFound { id });
    };

    println!("{} (ID: {}) - {}:", parent.name, parent.id, kind_of(&parent));
    let children = client.children(&parent.id, recurse).await?;
    if recurse {
        print_tree(&parent.id, &children, 1);
    } else {
        for child in &children {
            println!("\t{} (ID: {}) - {}", child.name, child.id, kind_of(child));
        }
    }
    Ok(0)
}

async fn run_info(args: &[String]) -> Result<i32> {
    let Some(id) = args.iter().find(|a| !a.starts_with('-')) else {
        eprintln!("Usage: jelly info <id>");
        return Ok(1);
    };
    let client = connect_client(load_credentials(false)?, true).await?;
    let Some(item) = client.item(id).await? else {
        return Err(Error::ItemNotFound { id: id.clone() });
    };
    println!("{}", serde_json::to_string_pretty(&item)?);
    Ok(0)
}

async fn run_download(args: &[String]) -> Result<i32> {
    let mut options = DownloadOptions::default();
    let mut id = None;
    let mut destination = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--force" | "-f" => options.force = true,
            "--throttle" | "-t" => {
                i += 1;
                let value = args.get(i).and_then(|v| v.parse::<usize>().ok());
                let Some(value) = value else {
                    eprintln!("--throttle requires a number");
                    return Ok(1);
                };
                options.concurrency = value.max(1);
            }
            other if !other.starts_with('-') => {
                if id.is_none() {
                    id = Some(other.to_string());
                } else if destination.is_none() {
                    destination = Some(other.to_string());
                } else {
                    eprintln!("Unexpected argument: {other}");
                    return Ok(1);
                }
            }
            other => {
                eprintln!("Unknown option: {other}");
                return Ok(1);
            }
        }
        i += 1;
    }

    let Some(id) = id else {
        eprintln!("Usage: jelly download <id> [destination] [--force|-f] [--throttle|-t <N>]");
        return Ok(1);
    };

    let client = Arc::new(connect_client(load_credentials(false)?, true).await?);
    let Some(root) = client.item(&id).await? else {
        return Err(Error::ItemNotFound { id });
    };

    let fs = TokioFileSystem::new();
    let destination = plan::resolve_destination(
        &fs,
        destination.as_deref().unwrap_or("."),
        options.force,
    )
    .await?;
    let tasks = plan::resolve_tasks(client.as_ref(), &fs, &root, &destination).await?;
    if tasks.is_empty() {
        println!("Nothing to download.");
        return Ok(0);
    }
    if root.is_collection() {
        println!(
            "{} is a collection, downloading {} item(s)...",
            root.name,
            tasks.len()
        );
    }

    let tracker = Arc::new(ProgressTracker::new());
    let downloader = Downloader::new(
        Arc::clone(&client) as Arc<dyn MediaServer>,
        Arc::clone(&tracker),
        options.concurrency,
    );
    let scheduler = tokio::spawn(async move { downloader.download_all(tasks).await });

    let mut term_renderer;
    let mut silent_renderer;
    let renderer: &mut dyn ProgressRenderer = if Term::stdout().is_term() {
        term_renderer = TermRenderer::new();
        &mut term_renderer
    } else {
        silent_renderer = SilentRenderer;
        &mut silent_renderer
    };
    run_render_loop(&tracker, renderer, RENDER_TICK, scheduler).await?;

    let finished = tracker
        .snapshot()
        .iter()
        .filter(|e| e.finished)
        .count();
    println!("Downloaded {finished} file(s).");
    Ok(0)
}
