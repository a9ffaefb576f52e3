//! Command handlers for the meh CLI

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{Level, event};

use crate::{
    app::{App, QueueKind},
    cli::args::{Cli, Commands, ConfigCommands, JournalCommands, MoodCommands, QueueCommands, TaskCommands},
    config::{Settings, get_config_file_path, init_settings},
    domain::{
        constant,
        mutation::{CreateJournalEntryRequest, CreateMoodEntryRequest, CreateTaskRequest, UpdateJournalEntryRequest}
    },
    ui::{
        display::{self, QueueRow},
        progress::create_sync_spinner
    }
};

/// Run one parsed command
///
/// Config commands only touch the settings file; everything else goes
/// through a fully wired [`App`].
pub async fn run(cli: Cli, settings: Settings) -> Result<()> {
    let command = match cli.command {
        Commands::Config { command } => return handle_config(command, &settings),
        command => command
    };

    let app = Arc::new(App::new(settings).context("Failed to set up the application")?);
    let force_offline = cli.offline;

    match command {
        Commands::Task { command } => {
            app.connect(QueueKind::Tasks, force_offline).await;
            handle_task(&app, command).await
        }
        Commands::Mood { command } => {
            app.connect(QueueKind::Moods, force_offline).await;
            handle_mood(&app, command).await
        }
        Commands::Journal { command } => {
            app.connect(QueueKind::Journal, force_offline).await;
            handle_journal(&app, command).await
        }
        Commands::Queue { command } => handle_queue(&app, command).await,
        Commands::Sync => {
            app.detect_network(force_offline).await;
            sync_all(&app).await;
            Ok(())
        }
        Commands::Watch { interval } => watch(app, force_offline, Duration::from_secs(interval.max(1))).await,
        Commands::Config { command } => handle_config(command, &app.settings)
    }
}

fn handle_config(command: ConfigCommands, settings: &Settings) -> Result<()> {
    match command {
        ConfigCommands::Init { force } => {
            let path = init_settings(force)?;
            println!("Config file: {}", path.display());
        }
        ConfigCommands::Show => {
            println!("# {}", get_config_file_path()?.display());
            print!("{}", serde_yaml::to_string(settings).context("Failed to serialize config")?);
        }
    }
    Ok(())
}

async fn handle_task(app: &App, command: TaskCommands) -> Result<()> {
    match command {
        TaskCommands::Add { title, description, priority, due, tags } => {
            let request = CreateTaskRequest { title, description, priority, due_date: due, tags };
            let task = app.tasks.create_task(request).await;
            display::show_task(task.as_ref());
        }
    }
    Ok(())
}

async fn handle_mood(app: &App, command: MoodCommands) -> Result<()> {
    match command {
        MoodCommands::Add { score, date, tags, note } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let entry = app.moods.create_mood_entry(CreateMoodEntryRequest { score, date, tags, note }).await;
            display::show_mood_entry(entry.as_ref());
        }
    }
    Ok(())
}

async fn handle_journal(app: &App, command: JournalCommands) -> Result<()> {
    match command {
        JournalCommands::Add { content, date, tags } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let entry = app.journal.create_entry(CreateJournalEntryRequest { date, content, tags }).await;
            display::show_journal_entry(entry.as_ref(), false);
        }
        JournalCommands::Update { id, content } => {
            let request = UpdateJournalEntryRequest { id, content: Some(content), tags: None };
            let entry = app.journal.update_entry(request).await;
            display::show_journal_entry(entry.as_ref(), true);
        }
    }
    Ok(())
}

async fn handle_queue(app: &App, command: QueueCommands) -> Result<()> {
    app.refresh().await;

    match command {
        QueueCommands::Status => {
            let rows = QueueKind::ALL
                .into_iter()
                .map(|kind| QueueRow::new(kind, app.namespace(kind), app.status(kind)))
                .collect();
            display::show_queue_status(rows, app.storage_available());
            if let Some(path) = app.storage_location() {
                println!("Store: {}", path.display());
            }
        }
        QueueCommands::List { queue, dead } => {
            let entries = app.entries(queue, dead).await.context("Failed to read the queue")?;
            display::show_entries(queue, dead, entries);
        }
        QueueCommands::Retry { queue } => {
            let moved = app.retry_dead_letters(queue).await.context("Failed to requeue dead letters")?;
            println!("Moved {} dead letter(s) back into {}.", moved, queue.as_str());
        }
        QueueCommands::Purge { queue } => {
            let dropped = app.purge_dead_letters(queue).await.context("Failed to purge dead letters")?;
            println!("Dropped {} dead letter(s) from {}.", dropped, queue.as_str());
        }
    }
    Ok(())
}

async fn sync_all(app: &App) {
    for kind in QueueKind::ALL {
        let spinner = create_sync_spinner(&format!("Syncing {}...", kind.as_str()));
        let outcome = app.sync(kind).await;
        spinner.finish_with_message(display::describe_outcome(kind, &outcome));
    }
}

async fn watch(app: Arc<App>, force_offline: bool, interval: Duration) -> Result<()> {
    let shutdown = CancellationToken::new();

    let mut handles = app.start_auto_sync(&shutdown);
    if force_offline {
        app.detect_network(true).await;
    } else {
        handles.push(app.start_probe(interval, shutdown.clone()));
    }

    println!("Watching for connectivity; press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    shutdown.cancel();

    for handle in handles {
        if let Err(e) = handle.await {
            event!(Level::WARN, event = constant::cli::BACKGROUND_TASK_FAILED, error = %e);
        }
    }

    app.refresh().await;
    for kind in QueueKind::ALL {
        println!("{}: {} pending", kind.as_str(), app.status(kind).pending);
    }
    display::show_confirmed_events(&app.statistics.snapshot());
    Ok(())
}
