//! Interactive Drive Folder Browser
//!
//! Browses a Drive folder from the terminal.
//!
//! Credentials come from the environment: either `GOOGLE_SERVICE_ACCOUNT_KEY`
//! (path to a JSON key) or `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET` and
//! `GOOGLE_REFRESH_TOKEN`. The root folder is `DRIVE_ROOT_FOLDER_ID`.
//!
//! ```text
//! RUST_LOG=integrations_drive_browser=debug cargo run --example browse
//! ```

use integrations_drive_browser::auth::scopes;
use integrations_drive_browser::prelude::*;
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
commands:
  ls                  show the current listing
  cd <name>           open a folder
  back                go up one folder
  search <text>       filter the current folder by name
  clear               leave search
  refresh             reload the current folder
  get <name>          download a file
  share <name>        print a file's link
  path <name>         print a file's path
  mkdir <name>        create a folder
  rm <name>           delete an entry
  put <local path>    upload a file
  quit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let root_id = env::var("DRIVE_ROOT_FOLDER_ID")?;
    let auth = auth_provider().await?;

    let config = BrowserConfig::builder()
        .auth_provider_arc(auth)
        .root_folder(root_id, "Drive Folder")
        .permissions(Permissions::Admin)
        .copyable_paths(true)
        .show_navigation_path(true)
        .build()?;
    let show_path = config.show_navigation_path;

    let gateway = DriveGateway::from_config(config.clone())?;
    let mut navigator = Navigator::from_config(gateway, &config);
    let mut events = navigator.subscribe_events();

    navigator.initialize()?;
    settle(&mut navigator, &mut events).await;
    print_listing(&navigator, show_path);
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, argument) = line.split_once(' ').unwrap_or((line, ""));
        let argument = argument.trim();

        let result = match command {
            "" => continue,
            "quit" | "exit" => break,
            "help" => {
                println!("{}", HELP);
                continue;
            }
            "ls" => Ok(()),
            "cd" => find(&navigator, argument).and_then(|entry| navigator.open(&entry).map(drop)),
            "back" => match navigator.go_back() {
                Ok(BackOutcome::RootReached) => {
                    println!("already at the root");
                    Ok(())
                }
                other => other.map(drop),
            },
            "search" => navigator.search(argument).map(drop),
            "clear" => navigator.close_search().map(drop),
            "refresh" => navigator.refresh().map(drop),
            "get" => find(&navigator, argument).and_then(|entry| {
                navigator
                    .download(&entry)
                    .map(|path| println!("saving to {}", path.display()))
            }),
            "share" => find(&navigator, argument)
                .and_then(|entry| navigator.share_link(&entry))
                .map(|link| println!("{}", link)),
            "path" => navigator
                .copy_path(argument)
                .map(|path| println!("{}", path)),
            "mkdir" => navigator.create_folder(argument),
            "rm" => find(&navigator, argument).and_then(|entry| navigator.delete(entry.id())),
            "put" => match UploadSource::from_path(argument).await {
                Ok(source) => navigator.upload(source),
                Err(e) => Err(e),
            },
            other => {
                println!("unknown command '{}'; try 'help'", other);
                continue;
            }
        };

        if let Err(e) = result {
            println!("error: {}", e);
        }
        settle(&mut navigator, &mut events).await;
        print_listing(&navigator, show_path);
    }

    Ok(())
}

async fn auth_provider() -> Result<Arc<dyn AuthProvider>, Box<dyn std::error::Error>> {
    if let Ok(key_path) = env::var("GOOGLE_SERVICE_ACCOUNT_KEY") {
        let provider =
            ServiceAccountProvider::from_json_file(key_path, vec![scopes::DRIVE.to_string()])
                .await?;
        return Ok(Arc::new(provider));
    }

    Ok(Arc::new(OAuth2Provider::new_with_strings(
        env::var("GOOGLE_CLIENT_ID")?,
        env::var("GOOGLE_CLIENT_SECRET")?,
        env::var("GOOGLE_REFRESH_TOKEN")?,
    )))
}

fn find(navigator: &Navigator<DriveGateway>, name: &str) -> BrowserResult<RemoteEntry> {
    navigator
        .listing()
        .entries()
        .iter()
        .find(|entry| entry.name() == name)
        .cloned()
        .ok_or_else(|| BrowserError::not_found(format!("no entry named '{}'", name)))
}

/// Applies completions until nothing is in flight, printing events as they arrive.
async fn settle(
    navigator: &mut Navigator<DriveGateway>,
    events: &mut broadcast::Receiver<BrowserEvent>,
) {
    while navigator.process_next().await.is_some() {
        while let Ok(event) = events.try_recv() {
            print_event(&event);
        }
    }
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
}

fn print_event(event: &BrowserEvent) {
    match event {
        BrowserEvent::RootReached => {}
        BrowserEvent::FolderCreated { folder, .. } => println!("created {}", folder.name()),
        BrowserEvent::Deleted { entry_id } => println!("deleted {}", entry_id),
        BrowserEvent::Uploaded { entry, .. } => println!("uploaded {}", entry.name()),
        BrowserEvent::DownloadStarted { file_name, .. } => println!("downloading {}", file_name),
        BrowserEvent::DownloadCompleted {
            file_name, bytes, ..
        } => println!("downloaded {} ({})", file_name, format_size(*bytes)),
        BrowserEvent::OperationFailed { operation, reason } => {
            println!("{} failed: {}", operation, reason)
        }
    }
}

fn print_listing(navigator: &Navigator<DriveGateway>, show_path: bool) {
    if let Some(header) = navigator.header(show_path) {
        let back = if header.show_back { "< " } else { "" };
        match header.subtitle {
            Some(path) => println!("\n{}{}  ({})", back, header.title, path),
            None => println!("\n{}{}", back, header.title),
        }
    }

    for row in render(&navigator.listing(), &navigator.row_policy()) {
        match row {
            Row::Loading => println!("  loading..."),
            Row::Empty => println!("  (empty)"),
            Row::Failed { reason } => println!("  failed: {}", reason),
            Row::Entry(entry) => println!(
                "  {:<6} {:<40} {:>10}  {}",
                format!("{:?}", entry.icon),
                entry.name,
                entry.size,
                entry.date
            ),
        }
    }
}
