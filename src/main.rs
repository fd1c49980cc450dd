#![deny(dead_code)] // DO NOT REMOVE THIS EVER
use anyhow::{anyhow, Result};
use clap::Parser;
use log::{error, info, LevelFilter};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

mod utils;

use palaver::format::{format_date, format_time};
use palaver::notify::{ChannelNotifier, NoticeLevel};
use palaver::session::{AuthSession, ThemeSetting};
use palaver::storage::{default_data_dir, FileStorage, Storage};
use palaver::{encode_image, mime_for_path, ChatStore, NewMessage, ResponseSimulator, SimulatorConfig, StoreEvent, User};

/// Command line arguments for Palaver
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Palaver: a terminal chat client with a simulated assistant.",
    long_about = "Palaver keeps your chatrooms on disk and answers every message with a simulated assistant.\n\n\
    Type /help once it is running to see the available commands."
)]
struct Args {
    /// Directory holding the chat, auth and theme slots
    #[arg(long, value_name = "PATH", env = "PALAVER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log file (defaults to palaver.log inside the data directory)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log level: off, error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: String,

    /// How long the assistant "types" before each reply
    #[arg(long, value_name = "MS", default_value_t = 1500)]
    typing_delay_ms: u64,

    /// Chance of a follow-up question after a reply (0.0 - 1.0)
    #[arg(long, value_name = "P", default_value_t = 0.3)]
    follow_up_probability: f64,

    /// Seed the reply picker for repeatable sessions
    #[arg(long)]
    seed: Option<u64>,
}

const HELP: &str = "\
Commands:
  /login <dial code> <phone>   Sign in, e.g. /login +91 9876543210
  /logout                      Sign out and forget all chatrooms
  /new <title>                 Create a chatroom and open it
  /list                        List chatrooms (filtered by /search)
  /search [query]              Filter chatrooms by title; no query clears
  /open <id>                   Open a chatroom
  /close                       Leave the current chatroom
  /delete <id>                 Delete a chatroom
  /history                     Show messages in the current chatroom
  /attach <path> [text]        Send an image with optional text
  /theme                       Toggle dark mode
  /help                        Show this help
  /quit                        Exit
Anything else is sent as a message to the open chatroom.";

struct App {
    store: ChatStore,
    simulator: ResponseSimulator,
    session: AuthSession,
    theme: ThemeSetting,
}

impl App {
    /// Handle one line of input. Returns false when the user wants to leave.
    async fn handle_line(&mut self, line: &str) -> Result<bool> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(true);
        }

        let (command, rest) = match line.split_once(' ') {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            "/quit" | "/exit" => return Ok(false),
            "/help" => println!("{}", HELP),
            "/login" => self.login(rest)?,
            "/theme" => {
                let dark = self.theme.toggle()?;
                println!("Theme: {}", if dark { "dark" } else { "light" });
            }
            _ if !self.session.is_authenticated() => {
                println!("Please sign in first: /login <dial code> <phone>");
            }
            "/logout" => {
                self.session.logout()?;
                println!("Signed out.");
            }
            "/new" => {
                let id = self.store.create_chatroom(rest)?;
                self.store.select_chatroom(Some(&id));
                println!("Created chatroom {}", id);
            }
            "/list" => self.list(),
            "/search" => self.store.set_search_query(rest),
            "/open" => {
                if !self.store.select_chatroom(Some(rest)) {
                    println!("No chatroom with id {}", rest);
                }
            }
            "/close" => {
                self.store.select_chatroom(None);
            }
            "/delete" => {
                if !self.store.delete_chatroom(rest) {
                    println!("No chatroom with id {}", rest);
                }
            }
            "/history" => self.history(),
            "/attach" => {
                let (path, text) = rest.split_once(' ').unwrap_or((rest, ""));
                self.attach(Path::new(path), text.trim()).await?;
            }
            _ if command.starts_with('/') => println!("Unknown command {}. Try /help", command),
            _ => self.send(NewMessage::from_user(line)),
        }
        Ok(true)
    }

    fn login(&mut self, rest: &str) -> Result<()> {
        let (code, phone) = rest
            .split_once(' ')
            .ok_or_else(|| anyhow!("Usage: /login <dial code> <phone>"))?;
        let phone = phone.trim();
        if !code.starts_with('+') || !phone.chars().all(|c| c.is_ascii_digit()) || !(6..=15).contains(&phone.len()) {
            return Err(anyhow!("Enter a dial code like +1 and a phone number of 6 to 15 digits"));
        }
        self.session.login(User::new(phone, code))?;
        println!("Welcome! {} chatrooms on file.", self.store.chatrooms().len());
        Ok(())
    }

    fn list(&self) {
        let current = self.store.current_chatroom_id();
        let today = chrono::Local::now().date_naive();
        let rooms = self.store.filtered_chatrooms();
        if rooms.is_empty() {
            println!("No chatrooms.");
        }
        for room in rooms {
            let marker = if current.as_deref() == Some(room.id.as_str()) { "*" } else { " " };
            let when = room.last_message_time.unwrap_or(room.created_at).with_timezone(&chrono::Local);
            println!(
                "{} {}  {}  [{}]  {}",
                marker,
                room.id,
                room.title,
                format_date(&when, today),
                room.last_message.as_deref().unwrap_or("No messages yet")
            );
        }
    }

    fn history(&self) {
        let Some(room) = self.store.current_chatroom() else {
            println!("No chatroom open.");
            return;
        };
        println!("== {} ==", room.title);
        for message in &room.messages {
            let who = if message.is_user { "you" } else { "assistant" };
            let image = if message.image.is_some() { " [image]" } else { "" };
            println!(
                "{} {}: {}{}",
                format_time(&message.timestamp.with_timezone(&chrono::Local)),
                who,
                message.content,
                image
            );
        }
    }

    async fn attach(&mut self, path: &Path, text: &str) -> Result<()> {
        let bytes = tokio::fs::read(path).await?;
        let image = encode_image(mime_for_path(path), &bytes);
        self.send(NewMessage::from_user(text).with_image(image));
        Ok(())
    }

    fn send(&self, message: NewMessage) {
        let Some(id) = self.store.current_chatroom_id() else {
            println!("Open a chatroom first (/new <title> or /open <id>).");
            return;
        };
        // The simulator task runs on its own; replies arrive as store events
        if self.simulator.submit(&id, message).is_none() {
            println!("That chatroom no longer exists.");
        }
    }
}

/// Print store changes as they happen
async fn print_events(store: ChatStore, mut events: tokio::sync::mpsc::Receiver<StoreEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            StoreEvent::MessageAppended { chatroom_id, message } if !message.is_user => {
                let title = store.get_chatroom(&chatroom_id).map(|r| r.title).unwrap_or_default();
                println!("[{}] assistant: {}", title, message.content);
            }
            StoreEvent::TypingChanged(true) => println!("assistant is typing..."),
            StoreEvent::SelectionChanged(Some(id)) => {
                if let Some(room) = store.get_chatroom(&id) {
                    println!("Opened {} ({} messages)", room.title, room.messages.len());
                }
            }
            StoreEvent::SelectionChanged(None) => println!("No chatroom open."),
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    std::fs::create_dir_all(&data_dir)?;
    let log_file = args.log_file.unwrap_or_else(|| data_dir.join("palaver.log"));
    let level = args.log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    utils::setup_logging(Some(&log_file), level)?;

    info!("Palaver starting up");
    info!("System information: {} {}", std::env::consts::OS, std::env::consts::ARCH);

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(&data_dir)?);
    let store = ChatStore::open(storage.clone());
    let session = AuthSession::open(storage.clone(), store.clone());
    let theme = ThemeSetting::open(storage);

    let config = SimulatorConfig {
        typing_delay: Duration::from_millis(args.typing_delay_ms),
        follow_up_probability: args.follow_up_probability,
        ..SimulatorConfig::default()
    };
    let (notifier, mut notices) = ChannelNotifier::new(32);
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let simulator = ResponseSimulator::with_rng(store.clone(), config, Arc::new(notifier), rng);

    tokio::spawn(print_events(store.clone(), store.subscribe()));
    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            match notice.level {
                NoticeLevel::Error => println!("! {}", notice.text),
                _ => println!("{}", notice.text),
            }
        }
    });

    let mut app = App { store, simulator, session, theme };
    match app.session.user() {
        Some(user) => println!("Signed in as {} {}. Type /help for commands.", user.country_code, user.phone_number),
        None => println!("Welcome to Palaver. Sign in with /login <dial code> <phone>."),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match app.handle_line(&line).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                error!("Command failed: {}", e);
                println!("! {}", e);
            }
        }
    }

    info!("Palaver shutting down");
    Ok(())
}
