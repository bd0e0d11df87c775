mod app;
mod clock;
mod config;
mod error;
mod lists;
mod lock;
mod store;
mod theme;
mod ui;
mod vault;
mod watch;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app::{App, Popup};
use config::AppConfig;
use lists::{ItemSort, ListSort};
use vault::Vault;

#[derive(Parser, Debug)]
#[command(name = "cinevault")]
#[command(version)]
#[command(about = "Keep movie lists, with PIN-locked sections that lock themselves")]
struct Args {
    /// Run the auto-lock watcher in the foreground
    #[arg(short, long)]
    watch: bool,

    /// Print the lock status of every protected section as JSON
    #[arg(short, long)]
    status: bool,

    /// Lock one section now
    #[arg(short, long, value_name = "SECTION")]
    lock: Option<String>,

    /// Lock every protected section
    #[arg(long)]
    lock_all: bool,

    /// Export the library lists to a file ("-" for stdout)
    #[arg(long, value_name = "PATH")]
    export: Option<String>,

    /// Replace the library lists with the contents of a file
    #[arg(long, value_name = "PATH")]
    import: Option<String>,

    /// Print the library list with this name, or every list whose name contains it
    #[arg(long, value_name = "NAME")]
    show: Option<String>,
}

impl Args {
    fn runs_tui(&self) -> bool {
        !(self.watch || self.status || self.lock_all || self.lock.is_some() || self.export.is_some() || self.import.is_some() || self.show.is_some())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load()?;

    // The TUI owns the terminal, so its logs go to a file
    if args.runs_tui() {
        init_file_logging(&config)?;
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }

    // Handle CLI-only commands
    if args.status {
        return print_status(config);
    }

    if let Some(section) = args.lock.as_deref() {
        return lock_section(config, section);
    }

    if args.lock_all {
        return lock_all(config);
    }

    if let Some(path) = args.export.as_deref() {
        return export_lists(config, path);
    }

    if let Some(path) = args.import.as_deref() {
        return import_lists(config, path);
    }

    if let Some(name) = args.show.as_deref() {
        return show_lists(config, name);
    }

    if args.watch {
        return watch::start_watching().await;
    }

    // Run TUI
    run_tui(config).await
}

fn init_file_logging(config: &AppConfig) -> Result<()> {
    let path = config.log_path()?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    Ok(())
}

fn print_status(config: AppConfig) -> Result<()> {
    let mut vault = Vault::open(config)?;
    // Apply any pending auto-lock before reporting
    vault.poll()?;

    let sections: Vec<_> = vault.sections().iter().map(|s| vault.lock.status(s)).collect();
    let output = serde_json::json!({
        "role": vault.lock.session().role(),
        "autoLock": vault.lock.session().settings(),
        "sections": sections,
        "lists": vault.library.stats(),
    });

    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn lock_section(config: AppConfig, section: &str) -> Result<()> {
    let mut vault = Vault::open(config)?;
    if !vault.sections().iter().any(|s| s == section) {
        anyhow::bail!("'{}' is not a protected section", section);
    }
    vault.lock.lock(section)?;
    println!("Locked {}", section);
    Ok(())
}

fn lock_all(config: AppConfig) -> Result<()> {
    let mut vault = Vault::open(config)?;
    let sections = vault.sections().to_vec();
    vault.lock.lock_all(&sections)?;
    println!("Locked {} section(s)", sections.len());
    Ok(())
}

fn export_lists(config: AppConfig, path: &str) -> Result<()> {
    let vault = Vault::open(config)?;
    let blob = vault.library.export_all()?;
    if path == "-" {
        println!("{}", blob);
    } else {
        std::fs::write(path, blob).with_context(|| format!("Failed to write {}", path))?;
        eprintln!("Exported {} lists to {}", vault.library.lists().len(), path);
    }
    Ok(())
}

fn import_lists(config: AppConfig, path: &str) -> Result<()> {
    let blob = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let mut vault = Vault::open(config)?;
    let count = vault.library.import_all(&blob)?;
    println!("Imported {} lists", count);
    Ok(())
}

fn show_lists(config: AppConfig, name: &str) -> Result<()> {
    let vault = Vault::open(config)?;
    let output = match vault.library.find(name).and_then(|i| vault.library.get(i)) {
        Some(list) => serde_json::to_string_pretty(list)?,
        None => {
            let matches = vault.library.view(name, ListSort::NameAsc, ItemSort::InsertionOrder);
            if matches.is_empty() {
                anyhow::bail!("No list matches '{}'", name);
            }
            serde_json::to_string_pretty(&matches)?
        }
    };
    println!("{}", output);
    Ok(())
}

async fn run_tui(config: AppConfig) -> Result<()> {
    // Create app state before touching the terminal so errors print normally
    let mut app = App::new(Vault::open(config)?);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') if app.popup == Popup::None => return Ok(()),
                        KeyCode::Char('c') if key.modifiers.contains(event::KeyModifiers::CONTROL) => {
                            return Ok(())
                        }
                        _ => {
                            // Handle key and catch any errors to prevent crashes
                            if let Err(e) = app.handle_key(key) {
                                app.set_status(format!("Error: {}", e));
                            }
                        }
                    }
                }
            }
        }

        // Periodic refresh
        if let Err(e) = app.tick() {
            tracing::error!("Tick failed: {}", e);
        }
    }
}

/// Desktop notification for an auto-locked section
pub fn notify_locked(section: &str) {
    let result = notify_rust::Notification::new()
        .summary("cinevault")
        .body(&format!("{} locked after inactivity", section))
        .icon("changes-prevent")
        .show();
    if let Err(e) = result {
        tracing::warn!("Notification failed: {}", e);
    }
}
