mod common;
mod config;
mod network;
mod sync;
mod ui;

use std::error::Error;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;

use config::AppConfig;
use network::UserDirectory;
use sync::{ChatSession, Side, SubmitOutcome};
use ui::ChatApp;

#[derive(Parser)]
#[command(
    name = "rust_chat_sync",
    version,
    about = "Realtime two-party chat client"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Override the local user id from the config file
    #[arg(long)]
    user_id: Option<i64>,
    /// Override the local username from the config file
    #[arg(long)]
    username: Option<String>,
    /// Open a chat with this user on startup
    #[arg(long)]
    peer: Option<i64>,
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Clone, PartialEq, Eq)]
enum Mode {
    /// Run the development relay server (no UI)
    Relay {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Chat from the terminal: stdin lines are sent, messages are printed
    Term {
        #[arg(long)]
        peer: i64,
    },
    /// Look up users in the directory service
    Search { query: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    // Khởi tạo Logger để debug
    env_logger::init();

    let cli = Cli::parse();
    let mut app_config = config::load_config(&cli.config);
    if let Some(user_id) = cli.user_id {
        app_config.local_user_id = user_id;
    }
    if let Some(username) = cli.username {
        app_config.local_username = username;
    }

    match cli.mode {
        Some(Mode::Relay { bind }) => {
            let bind = bind.unwrap_or_else(|| app_config.relay_bind.clone());
            network::relay::run(&bind).await
        }
        Some(Mode::Term { peer }) => run_terminal(app_config, &cli.config, peer).await,
        Some(Mode::Search { query }) => run_search(&app_config, &query).await,
        None => run_desktop(app_config, cli.config, cli.peer),
    }
}

fn run_desktop(
    app_config: AppConfig,
    config_path: String,
    initial_peer: Option<i64>,
) -> Result<(), Box<dyn Error>> {
    let options = eframe::NativeOptions::default();
    // UI chạy trên main thread, các task mạng chạy trên runtime tokio.
    let runtime = Handle::current();

    log::info!(
        "Client started as user {} ({})",
        app_config.local_user_id,
        app_config.local_username
    );

    eframe::run_native(
        "Rust Chat",
        options,
        Box::new(move |cc| {
            Ok(Box::new(ChatApp::new(
                cc,
                app_config,
                config_path,
                runtime,
                initial_peer,
            )))
        }),
    )?;
    Ok(())
}

async fn run_terminal(
    app_config: AppConfig,
    config_path: &str,
    peer_id: i64,
) -> Result<(), Box<dyn Error>> {
    config::persist_recent_peer(config_path, peer_id);
    let address = app_config.channel_address(peer_id);
    let mut session = ChatSession::open(app_config.local_user_id, peer_id, &address)?;
    log::info!("Chatting with user {peer_id} via {address}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut printed = 0;

    loop {
        tokio::select! {
            event = session.next_event() => {
                if event.is_none() {
                    break;
                }
                let entries = session.view().transcript().entries();
                for entry in &entries[printed..] {
                    match entry.side {
                        Side::Own => println!("{entry}  (you)"),
                        Side::Other => println!("{entry}"),
                    }
                }
                printed = session.view().transcript().len();
            }
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    session.compose_mut().set_input(line);
                    if let SubmitOutcome::Rejected(reason) = session.submit() {
                        eprintln!(
                            "Message not sent ({reason}), kept {:?}",
                            session.compose().input()
                        );
                    }
                }
                None => {
                    stdin_open = false;
                    session.close();
                }
            },
        }
    }

    if let Some(err) = session.view().connection_lost() {
        eprintln!("{err}");
    }
    Ok(())
}

async fn run_search(app_config: &AppConfig, query: &str) -> Result<(), Box<dyn Error>> {
    let base_url = app_config
        .directory_url
        .as_deref()
        .ok_or("directory_url is not configured")?;
    let directory = UserDirectory::new(
        base_url,
        &app_config.search_path,
        &app_config.start_chat_path,
        app_config.search_min_chars,
    );
    if !directory.should_search(query) {
        log::warn!(
            "Query {query:?} is shorter than {} characters",
            app_config.search_min_chars
        );
        return Ok(());
    }

    for user in directory.search(query).await? {
        println!("{}\t{}", user.id, user.username);
    }
    Ok(())
}
