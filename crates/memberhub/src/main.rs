//! `mhub` - CLI for memberhub
//!
//! This binary builds navigation menus from the local database and manages
//! the member session stored on this device.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use clap::Parser;

use memberhub::cli::{Cli, Command, ConfigCommand, MenuCommand, SessionCommand};
use memberhub::menu::{
    read_records_file, ForestOptions, MenuNode, MenuTreeBuilder, SqliteMenuSource,
};
use memberhub::session::{InProcessFeed, SqliteSlotStore, TracingNavigator};
use memberhub::{init_logging, Config, LocalSessionStore, MemberSession, Storage};

/// Channel name for session change events within this process.
const FEED_CHANNEL: &str = "mhub";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Menu(menu_cmd) => handle_menu(&config, menu_cmd).await,
        Command::Session(session_cmd) => handle_session(&config, session_cmd),
        Command::Status(status_cmd) => handle_status(&config, status_cmd.json),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Arc<Mutex<Storage>>> {
    let path = config.database_path();
    let storage = Storage::open(&path)
        .with_context(|| format!("opening database {}", path.display()))?;
    Ok(Arc::new(Mutex::new(storage)))
}

fn session_store(config: &Config, storage: Arc<Mutex<Storage>>) -> LocalSessionStore {
    LocalSessionStore::with_config(
        &config.session,
        Arc::new(SqliteSlotStore::new(storage)),
        Arc::new(InProcessFeed::new(FEED_CHANNEL)),
        Arc::new(TracingNavigator),
    )
}

async fn handle_menu(config: &Config, cmd: MenuCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;

    match cmd {
        MenuCommand::Show {
            menu_type,
            json,
            orphans,
        } => {
            let options = ForestOptions {
                orphan_policy: orphans.map_or(config.menu.orphan_policy, Into::into),
                links: config.menu.link_options(),
            };
            let builder = MenuTreeBuilder::with_options(
                SqliteMenuSource::new(storage),
                options,
                config.menu.fetch_policy,
            );
            builder
                .fetch(&menu_type)
                .await
                .with_context(|| format!("building menu '{menu_type}'"))?;

            let forest = builder.forest();
            if json {
                println!("{}", serde_json::to_string_pretty(&forest)?);
            } else if forest.is_empty() {
                println!("Menu '{menu_type}' is empty.");
            } else {
                println!("{menu_type}");
                print_forest(&forest, 1);
            }
        }
        MenuCommand::Import { menu_type, file } => {
            let records = read_records_file(&file)
                .with_context(|| format!("reading menu records from {}", file.display()))?;
            let storage = storage.lock().unwrap_or_else(PoisonError::into_inner);
            let stored = storage.replace_menu(&menu_type, &records)?;
            println!("Imported {stored} items into menu '{menu_type}'.");
        }
        MenuCommand::Types { json } => {
            let storage = storage.lock().unwrap_or_else(PoisonError::into_inner);
            let types = storage.menu_types()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&types)?);
            } else if types.is_empty() {
                println!("No menus stored.");
            } else {
                for summary in types {
                    println!("{:<20} {:>5} items", summary.menu_type, summary.items);
                }
            }
        }
        MenuCommand::Delete { menu_type } => {
            let storage = storage.lock().unwrap_or_else(PoisonError::into_inner);
            let deleted = storage.delete_menu(&menu_type)?;
            println!("Deleted {deleted} items from menu '{menu_type}'.");
        }
    }
    Ok(())
}

fn print_forest(nodes: &[MenuNode], depth: usize) {
    for node in nodes {
        let marker = if node.record.open_in_new_tab {
            " (new tab)"
        } else {
            ""
        };
        println!(
            "{}- {} -> {}{marker}",
            "  ".repeat(depth),
            node.name(),
            node.resolved_href
        );
        print_forest(&node.children, depth + 1);
    }
}

fn handle_session(config: &Config, cmd: SessionCommand) -> anyhow::Result<()> {
    let store = session_store(config, open_storage(config)?);

    match cmd {
        SessionCommand::Show { json } => {
            let session = store.load();
            if json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            } else {
                match session {
                    Some(session) => print_session(&session),
                    None => println!("Nobody is signed in."),
                }
            }
        }
        SessionCommand::Join {
            first_name,
            last_name,
            email,
            display_name,
        } => {
            let session = MemberSession::join(first_name, last_name, email, display_name);
            store.save(&session)?;
            println!("Welcome, {}!", session.display_name);
        }
        SessionCommand::SignOut => {
            let was = store.load();
            store.sign_out();
            match was {
                Some(session) => println!("Signed out {}.", session.display_name),
                None => println!("Nobody was signed in."),
            }
        }
    }
    Ok(())
}

fn print_session(session: &MemberSession) {
    println!("Signed in as {}", session.display_name);
    println!("  Name:    {} {}", session.first_name, session.last_name);
    println!("  Email:   {}", session.email);
    println!("  Joined:  {}", session.joined_at);
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let stats = storage
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .stats()?;
    let session = session_store(config, storage).load();

    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "storage": stats,
            "signed_in": session.as_ref().map(|s| &s.display_name),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("mhub status");
        println!("-----------");
        println!("Database:      {}", config.database_path().display());
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Menus:         {} ({} items)", stats.menu_types, stats.menu_items);
        println!("Pages:         {}", stats.pages);
        match session {
            Some(session) => println!("Signed in:     {}", session.display_name),
            None => println!("Signed in:     nobody"),
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Menu]");
                println!("  Orphan policy:      {}", config.menu.orphan_policy);
                println!("  Fetch policy:       {}", config.menu.fetch_policy);
                println!("  Page path prefix:   {}", config.menu.page_path_prefix);
                println!("  Placeholder href:   {}", config.menu.placeholder_href);
                println!();
                println!("[Session]");
                println!("  Slot key:           {}", config.session.key);
                println!("  Sign-out path:      {}", config.session.sign_out_path);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
