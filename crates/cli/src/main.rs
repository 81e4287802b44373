use clap::{Parser, Subcommand};
use lib::client::ChatClient;
use lib::ui::{MessageId, Screen, UiEvent};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "mhoro")]
#[command(about = "Mhoro — chat with a random stranger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the profile directory and a default config file
    Init {
        /// Config file path (default: MHORO_CONFIG_PATH or ~/.mhoro/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Connect and chat (interactive)
    Chat {
        /// Config file path (default: MHORO_CONFIG_PATH or ~/.mhoro/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("mhoro {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config }) => {
            if let Err(e) = run_chat(config).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            if let Err(e) = run_chat(None).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::config::init_config_dir(&path)?;
    println!("initialized profile at {}", dir.display());
    Ok(())
}

async fn run_chat(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let (config, _path) = lib::config::load_config(config_path)?;
    let (events_tx, mut events_rx) = tokio::sync::mpsc::channel(64);
    let client = ChatClient::start(&config, events_tx).await?;

    let renderer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            render(&event);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_line(&client, line.trim()).await {
                            break;
                        }
                    }
                    _ => break,
                }
            }
        }
    }

    client.shutdown().await;
    renderer.abort();
    println!("bye");
    Ok(())
}

/// Turn one REPL line into a client intent. Returns false to quit.
async fn handle_line(client: &ChatClient, input: &str) -> bool {
    if input.is_empty() {
        return true;
    }
    match input {
        "/quit" | "/exit" => return false,
        "/help" => print_help(),
        "/skip" => client.skip_username().await,
        "/search" => client.start_search().await,
        "/cancel" => client.cancel_search().await,
        "/end" => client.end_chat().await,
        "/who" => client.refresh_online_count().await,
        _ => {
            if let Some(name) = input.strip_prefix("/name ") {
                client.submit_username(name).await;
            } else if input.starts_with('/') {
                println!("unknown command: {} (try /help)", input);
            } else {
                client.send_message(input).await;
            }
        }
    }
    true
}

fn print_help() {
    println!("  /name <name>  choose a display name");
    println!("  /skip         take a random name");
    println!("  /search       look for a stranger");
    println!("  /cancel       stop searching");
    println!("  /end          leave the current chat");
    println!("  /who          show how many people are online");
    println!("  /quit         exit");
    println!("  anything else is sent as a message");
}

/// One line per event. A scrollback terminal cannot unrender, so a retract
/// is silent and the reconciled copy of an own message prints as a delivery
/// marker instead of a second bubble.
fn render(event: &UiEvent) {
    match event {
        UiEvent::Screen(Screen::Username) => {
            println!("-- choose a name: /name <name>, or /skip for a random one");
        }
        UiEvent::Screen(Screen::Welcome) => {
            println!("-- ready. /search to find a stranger (/help for commands)");
        }
        UiEvent::Screen(Screen::Waiting) => {
            println!("-- looking for a stranger... /cancel to stop");
        }
        UiEvent::Screen(Screen::Chat) => {
            println!("-- connected. type to chat, /end to leave");
        }
        UiEvent::OnlineCount(n) => println!("-- {} online now", n),
        UiEvent::Message(line) => {
            let when = chrono::Local::now().format("%H:%M");
            match (&line.id, line.origin_self) {
                (MessageId::Server(id), true) => println!("   (delivered, #{})", id),
                (_, true) => println!("[{}] you: {}", when, line.text),
                (_, false) => println!("[{}] {}: {}", when, line.author, line.text),
            }
        }
        UiEvent::Retract(_) => {}
        UiEvent::SendFailed(id) => println!("   (!) message {} was not delivered", id),
        UiEvent::System(text) => println!("** {}", text),
        UiEvent::Notice(text) => println!("!! {}", text),
    }
}
