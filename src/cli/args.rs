//! CLI argument parsing

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::{app::QueueKind, domain::mutation::TaskPriority};

#[derive(Parser)]
#[command(name = "meh", author, version, about = "Track tasks, moods and journal entries, online or not")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Treat the backend as unreachable and queue every mutation
    #[arg(long, global = true)]
    pub offline: bool,

    /// Log at debug level unless MEH_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand)]
pub enum Commands {
    /// Task commands
    Task {
        #[command(subcommand)]
        command: TaskCommands
    },
    /// Mood tracking commands
    Mood {
        #[command(subcommand)]
        command: MoodCommands
    },
    /// Journal commands
    Journal {
        #[command(subcommand)]
        command: JournalCommands
    },
    /// Inspect and manage the offline queues
    Queue {
        #[command(subcommand)]
        command: QueueCommands
    },
    /// Replay every queued mutation now
    Sync,
    /// Keep probing the backend and sync whenever it comes back, until Ctrl-C
    Watch {
        /// Seconds between health probes
        #[arg(long, default_value_t = 15)]
        interval: u64
    },
    /// Configuration file commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands
    }
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Create a task
    Add {
        title:       String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long, value_enum)]
        priority:    Option<TaskPriority>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due:         Option<NaiveDate>,
        #[arg(short, long = "tag")]
        tags:        Vec<String>
    }
}

#[derive(Subcommand)]
pub enum MoodCommands {
    /// Record a mood score from 1 to 5
    Add {
        #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
        score: u8,
        /// Day of the entry (YYYY-MM-DD), today when omitted
        #[arg(long)]
        date:  Option<NaiveDate>,
        #[arg(short, long = "tag")]
        tags:  Vec<String>,
        #[arg(short, long)]
        note:  Option<String>
    }
}

#[derive(Subcommand)]
pub enum JournalCommands {
    /// Write a journal entry
    Add {
        content: String,
        /// Day of the entry (YYYY-MM-DD), today when omitted
        #[arg(long)]
        date:    Option<NaiveDate>,
        #[arg(short, long = "tag")]
        tags:    Vec<String>
    },
    /// Replace the content of an existing entry
    Update {
        id:      i64,
        content: String
    }
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// Pending and dead-lettered counts per queue
    Status,
    /// List the entries of one queue
    List {
        #[arg(value_enum)]
        queue: QueueKind,
        /// Show dead-lettered entries instead
        #[arg(long)]
        dead:  bool
    },
    /// Move dead-lettered entries back into their queue
    Retry {
        #[arg(value_enum)]
        queue: QueueKind
    },
    /// Drop dead-lettered entries for good
    Purge {
        #[arg(value_enum)]
        queue: QueueKind
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool
    },
    /// Print the effective configuration
    Show
}
