use clap::{Parser, Subcommand};

use crate::app::DeviceClass;

#[derive(Debug, Parser)]
#[command(
    name = "timethread",
    version,
    about = "Read and write timestamped comment threads on podcast episodes"
)]
pub struct Cli {
    /// Comment server base URL (falls back to TIMETHREAD_SERVER)
    #[arg(long, global = true)]
    pub server: Option<String>,
    /// Account id; without it you browse as a guest
    #[arg(long, global = true)]
    pub user: Option<String>,
    /// Display name shown on new comments
    #[arg(long, global = true)]
    pub name: Option<String>,
    /// Layout class that decides the number of timeslots
    #[arg(long, global = true, value_enum)]
    pub device: Option<DeviceClass>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the comment threads around a point of an episode
    Show {
        episode: u64,
        /// Play head as M:SS, H:MM:SS or an H-MM-SS link token
        #[arg(long)]
        at: Option<String>,
        /// Print every thread instead of the visible window
        #[arg(long)]
        all: bool,
        /// Window duration in seconds for this view
        #[arg(long)]
        window: Option<u64>,
        /// Timeslot length in seconds; the slot count follows from the window
        #[arg(long)]
        slot_length: Option<u64>,
        /// Move the window by this many timeslots (negative goes back)
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        step: i32,
    },
    /// Post a comment at the play head
    Post {
        episode: u64,
        content: String,
        #[arg(long)]
        at: Option<String>,
        #[arg(long)]
        reply_to: Option<u64>,
    },
    /// Replace the text of one of your comments
    Edit {
        episode: u64,
        comment: u64,
        content: String,
    },
    /// Delete one of your comments
    Delete { episode: u64, comment: u64 },
    /// Upvote a comment; repeat to withdraw
    Vote {
        episode: u64,
        comment: u64,
        #[arg(long)]
        down: bool,
    },
    /// Show or change timeslot count and window duration
    Settings {
        #[arg(long)]
        timeslots: Option<u32>,
        #[arg(long)]
        window: Option<u64>,
    },
    /// List saved play head positions
    Progress {
        /// Forget every saved position
        #[arg(long)]
        clear: bool,
    },
}
