mod episode;
mod error;
mod histogram;
mod remote;
mod render;
mod session;
mod settings;
mod thread;
mod timepoint;
mod window;


use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use log::warn;

use crate::cli::{Cli, Command};
use crate::db::Database;
use crate::paths::{database_file_path, server_base_url};

pub use self::window::DeviceClass;

use self::episode::{EpisodeId, truncate};
use self::remote::{HttpRemote, SharedRemote};
use self::render::{comment_line, sparkline, thread_lines};
use self::session::{EpisodeSession, SessionState, Viewer};
use self::settings::{PlaybackProgress, UserSettings};
use self::thread::{CommentId, SyncState, VoteChange};
use self::timepoint::Timepoint;

const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(25);
const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

struct ShowLayout {
    all: bool,
    window: Option<u64>,
    slot_length: Option<u64>,
    step: i32,
}

/// Options shared by every command that talks to the comment server.
struct Connection {
    server: String,
    viewer: Viewer,
    device: Option<DeviceClass>,
}

pub fn run(cli: Cli) -> Result<()> {
    let db = open_db()?;
    let settings = UserSettings::load(&db)?;
    let connection = Connection {
        server: server_base_url(cli.server.as_deref()),
        viewer: match cli.user {
            Some(id) => {
                let name = cli.name.unwrap_or_else(|| id.clone());
                Viewer::member(&id, &name)
            }
            None => Viewer::Guest,
        },
        device: cli.device,
    };

    match cli.command {
        Command::Show {
            episode,
            at,
            all,
            window,
            slot_length,
            step,
        } => run_show(
            &db,
            &connection,
            settings,
            episode,
            at,
            ShowLayout {
                all,
                window,
                slot_length,
                step,
            },
        )?,
        Command::Post {
            episode,
            content,
            at,
            reply_to,
        } => run_post(&db, &connection, settings, episode, &content, at, reply_to)?,
        Command::Edit {
            episode,
            comment,
            content,
        } => run_edit(&connection, settings, episode, CommentId(comment), &content)?,
        Command::Delete { episode, comment } => {
            run_delete(&connection, settings, episode, CommentId(comment))?
        }
        Command::Vote {
            episode,
            comment,
            down,
        } => run_vote(&connection, settings, episode, CommentId(comment), !down)?,
        Command::Settings { timeslots, window } => run_settings(&db, settings, timeslots, window)?,
        Command::Progress { clear } => run_progress(&db, clear)?,
    }

    Ok(())
}

fn run_show(
    db: &Database,
    connection: &Connection,
    settings: UserSettings,
    episode_id: EpisodeId,
    at: Option<String>,
    layout: ShowLayout,
) -> Result<()> {
    let ShowLayout {
        all,
        window,
        slot_length,
        step,
    } = layout;
    let mut progress = PlaybackProgress::load(db)?;
    let mut session = open_session(connection, settings, episode_id)?;
    match at {
        Some(text) => {
            seek_play_head(&mut session, &text)?;
        }
        None => {
            if let Some(position) = progress.position(episode_id) {
                session.seek_to(position.seconds() as f64);
            }
        }
    }
    if let Some(duration) = window {
        session.resize_window(duration)?;
    }
    if let Some(seconds) = slot_length {
        session.set_timeslot_duration(seconds);
    }
    for _ in 0..step.unsigned_abs() {
        session.step_window(step > 0);
    }

    print_episode_header(&session);
    if all {
        if session.tree().is_empty() {
            println!("No comments on this episode yet.");
        }
        for root in session.tree().roots() {
            for line in thread_lines(session.tree(), session.ledger(), root) {
                println!("{line}");
            }
        }
    } else {
        print_window(&session);
    }

    progress.record(episode_id, session.position());
    progress.save(db)?;
    Ok(())
}

fn run_post(
    db: &Database,
    connection: &Connection,
    settings: UserSettings,
    episode_id: EpisodeId,
    content: &str,
    at: Option<String>,
    reply_to: Option<u64>,
) -> Result<()> {
    let mut session = open_session(connection, settings, episode_id)?;
    match at {
        Some(text) => {
            seek_play_head(&mut session, &text)?;
        }
        None => {
            let position = PlaybackProgress::load(db)?
                .position(episode_id)
                .unwrap_or(Timepoint::ZERO);
            session.seek_to(position.seconds() as f64);
        }
    }

    let placeholder = session.post_comment(reply_to.map(CommentId), content)?;
    session.settle();
    let id = session.current_id(placeholder).unwrap_or(placeholder);
    report_sync(comment_sync(&session, id), "post")?;
    println!(
        "Posted #{id} at {} (link token {})",
        session.position().format(),
        session.position().format_url_token()
    );
    if let Some(parent) = session.tree().parent_of(id) {
        println!(
            "  in reply to #{} by {} (depth {})",
            parent.id,
            parent.author.name,
            session.tree().depth(id).unwrap_or_default()
        );
    }
    Ok(())
}

fn run_edit(
    connection: &Connection,
    settings: UserSettings,
    episode_id: EpisodeId,
    id: CommentId,
    content: &str,
) -> Result<()> {
    let mut session = open_session(connection, settings, episode_id)?;
    session.edit_comment(id, content)?;
    session.settle();
    report_sync(comment_sync(&session, id), "edit")?;
    println!("Edited #{id}");
    Ok(())
}

fn run_delete(
    connection: &Connection,
    settings: UserSettings,
    episode_id: EpisodeId,
    id: CommentId,
) -> Result<()> {
    let mut session = open_session(connection, settings, episode_id)?;
    session.delete_comment(id)?;
    session.settle();
    report_sync(comment_sync(&session, id), "delete")?;
    println!("Deleted #{id}");
    Ok(())
}

fn run_vote(
    connection: &Connection,
    settings: UserSettings,
    episode_id: EpisodeId,
    id: CommentId,
    positive: bool,
) -> Result<()> {
    let mut session = open_session(connection, settings, episode_id)?;
    let change = session.vote(id, positive)?;
    session.settle();
    report_sync(comment_sync(&session, id), "vote")?;
    session.refresh_comment(id)?;
    session.settle();
    match change {
        VoteChange::Cast(direction) => println!("Voted {direction:?} on #{id}"),
        VoteChange::Withdrawn(direction) => println!("Withdrew {direction:?} vote on #{id}"),
        VoteChange::Switched { to } => println!("Switched vote on #{id} to {to:?}"),
    }
    if let Some(comment) = session.tree().get(id) {
        println!("{}", comment_line(comment, 0, session.ledger().vote_of(id)));
    }
    Ok(())
}

fn run_settings(
    db: &Database,
    settings: UserSettings,
    timeslots: Option<u32>,
    window: Option<u64>,
) -> Result<()> {
    let mut updated = settings;
    if let Some(count) = timeslots {
        updated = updated.with_timeslot_count(count)?;
    }
    if let Some(duration) = window {
        updated = updated.with_window_duration(duration)?;
    }
    if updated != settings {
        updated.save(db)?;
        println!("Settings saved.");
    }
    println!("Timeslots:       {}", updated.timeslot_count());
    println!("Window duration: {}s", updated.window_duration());
    Ok(())
}

fn run_progress(db: &Database, clear: bool) -> Result<()> {
    if clear {
        if PlaybackProgress::clear(db)? {
            println!("Saved positions cleared.");
        } else {
            println!("No saved positions to clear.");
        }
        return Ok(());
    }
    let progress = PlaybackProgress::load(db)?;
    if progress.is_empty() {
        println!("No saved positions yet. Run `timethread show <episode>` first.");
        return Ok(());
    }
    println!("{:<10} {:<10}", "EPISODE", "POSITION");
    for (episode_id, position) in progress.iter() {
        println!("{:<10} {:<10}", episode_id, position.format());
    }
    Ok(())
}

fn open_session(
    connection: &Connection,
    settings: UserSettings,
    episode_id: EpisodeId,
) -> Result<EpisodeSession> {
    let remote: SharedRemote = Arc::new(HttpRemote::new(&connection.server));
    let mut session = EpisodeSession::new(remote, connection.viewer.clone(), settings);
    session.open_episode(episode_id)?;

    let started = Instant::now();
    while session.state() != SessionState::Ready(episode_id) {
        if session.in_flight() == 0 {
            bail!("episode {episode_id} did not finish loading");
        }
        if started.elapsed() > LOAD_TIMEOUT {
            bail!("episode {episode_id} is still loading after {LOAD_TIMEOUT:?}");
        }
        if session.drain() == 0 {
            sleep(LOAD_POLL_INTERVAL);
        }
    }
    if let Some(device) = connection.device {
        session.apply_device_class(device);
    }
    Ok(session)
}

/// Accepts `M:SS`, `H:MM:SS` and `H-MM-SS` link tokens.
fn seek_play_head(session: &mut EpisodeSession, text: &str) -> Result<Timepoint> {
    let context = || format!("`{text}` is not a play head position");
    if text.contains('-') {
        return session.seek_to_token(text).with_context(context);
    }
    let target: Timepoint = text.parse().with_context(context)?;
    Ok(session.seek_to(target.seconds() as f64))
}

fn comment_sync(session: &EpisodeSession, id: CommentId) -> SyncState {
    session
        .tree()
        .get(id)
        .map_or(SyncState::Failed, |comment| comment.sync)
}

fn report_sync(sync: SyncState, action: &str) -> Result<()> {
    match sync {
        SyncState::Confirmed => Ok(()),
        SyncState::Pending => {
            warn!("{action} is still waiting for the server");
            Ok(())
        }
        SyncState::Failed => bail!("the server did not accept the {action}; see the log for details"),
    }
}

fn print_episode_header(session: &EpisodeSession) {
    let Some(episode) = session.episode() else {
        return;
    };
    let window = session.window();
    println!(
        "{} (#{}, {})",
        truncate(&episode.title, 60),
        episode.id,
        Timepoint::from_secs(episode.duration()).format_full()
    );
    println!(
        "Play head {}  window {} - {}  {} comments",
        session.position().format(),
        window.start.format(),
        window.end().format(),
        session.tree().len()
    );
    println!(
        "[{}] {:.0}s per bucket",
        sparkline(session.histogram()),
        session.histogram().bucket_width()
    );
}

fn print_window(session: &EpisodeSession) {
    let slots = session.window().timeslots();
    for (range, comments) in slots.iter().zip(session.comments_by_timeslot()) {
        println!("\n-- {} - {} --", range.start().format(), range.end().format());
        if comments.is_empty() {
            println!("  (no comments)");
        }
        for root in comments {
            for line in thread_lines(session.tree(), session.ledger(), root) {
                println!("  {line}");
            }
        }
    }
}

fn open_db() -> Result<Database> {
    let db_path = database_file_path()?;
    let db = Database::open(&db_path)?;
    db.migrate()?;
    Ok(db)
}
