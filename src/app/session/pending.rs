use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use log::{debug, warn};

use super::super::episode::EpisodeId;
use super::super::error::RemoteError;
use super::super::remote::{
    CommentRecord, HistogramRecord, RemoteService, SharedRemote, VoteCommentRecord, VoteFilter,
};
use super::super::thread::{NodeKey, VoteDirection};

/// Result of a background remote call, tagged with the load generation it
/// was issued under.
#[derive(Debug)]
pub(super) enum RemoteEvent {
    Loaded {
        generation: u64,
        episode_id: EpisodeId,
        outcome: LoadOutcome,
    },
    CommentCreated {
        generation: u64,
        key: NodeKey,
        result: Result<CommentRecord, RemoteError>,
    },
    CommentWritten {
        generation: u64,
        key: NodeKey,
        action: &'static str,
        result: Result<(), RemoteError>,
    },
    CommentFetched {
        generation: u64,
        key: NodeKey,
        result: Result<CommentRecord, RemoteError>,
    },
    VoteSynced {
        generation: u64,
        key: NodeKey,
        target: Option<VoteDirection>,
        result: Result<(), RemoteError>,
    },
}

impl RemoteEvent {
    pub(super) fn generation(&self) -> u64 {
        match self {
            Self::Loaded { generation, .. }
            | Self::CommentCreated { generation, .. }
            | Self::CommentWritten { generation, .. }
            | Self::CommentFetched { generation, .. }
            | Self::VoteSynced { generation, .. } => *generation,
        }
    }
}

#[derive(Debug)]
pub(super) struct LoadOutcome {
    pub(super) comments: Result<Vec<CommentRecord>, RemoteError>,
    /// `None` when votes were not requested.
    pub(super) votes: Option<Result<Vec<VoteCommentRecord>, RemoteError>>,
    pub(super) histogram: Result<HistogramRecord, RemoteError>,
}

/// Write bookkeeping for one comment. At most one write per comment is in
/// flight; later local changes are flushed when it lands.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct CommentSync {
    pub(super) created: bool,
    pub(super) in_flight: bool,
    pub(super) content_dirty: bool,
    pub(super) delete_pending: bool,
}

impl CommentSync {
    pub(super) fn confirmed() -> Self {
        Self {
            created: true,
            ..Self::default()
        }
    }
}

/// The viewer's vote on one comment as last acknowledged by the server.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct VoteSync {
    pub(super) in_flight: bool,
    pub(super) server: Option<VoteDirection>,
}

const WORKER_PANICKED: &str = "remote worker panicked";

/// Runs remote calls on worker threads and hands their results back over a channel.
///
/// Every spawned job sends exactly one message, `None` when the job itself
/// panicked, so `in_flight` always returns to zero.
pub(super) struct Dispatcher {
    remote: SharedRemote,
    tx: mpsc::Sender<Option<RemoteEvent>>,
    rx: mpsc::Receiver<Option<RemoteEvent>>,
    in_flight: usize,
}

impl Dispatcher {
    pub(super) fn new(remote: SharedRemote) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            remote,
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub(super) fn remote(&self) -> &dyn RemoteService {
        self.remote.as_ref()
    }

    pub(super) fn spawn<F>(&mut self, job: F)
    where
        F: FnOnce(&dyn RemoteService) -> RemoteEvent + Send + 'static,
    {
        self.in_flight += 1;
        let remote = Arc::clone(&self.remote);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let event = panic::catch_unwind(AssertUnwindSafe(|| job(remote.as_ref()))).ok();
            if event.is_none() {
                warn!("{WORKER_PANICKED}; its result is lost");
            }
            if tx.send(event).is_err() {
                debug!("session dropped before a remote result arrived");
            }
        });
    }

    pub(super) fn try_next(&mut self) -> Option<RemoteEvent> {
        loop {
            let slot = self.rx.try_recv().ok()?;
            self.in_flight -= 1;
            if slot.is_some() {
                return slot;
            }
        }
    }

    pub(super) fn next_blocking(&mut self) -> Option<RemoteEvent> {
        while self.in_flight > 0 {
            let slot = self.rx.recv().ok()?;
            self.in_flight -= 1;
            if slot.is_some() {
                return slot;
            }
        }
        None
    }

    pub(super) fn in_flight(&self) -> usize {
        self.in_flight
    }
}

/// Fetches comments, votes and the histogram side by side.
pub(super) fn fetch_episode_bundle(
    remote: &dyn RemoteService,
    episode_id: EpisodeId,
    vote_filter: Option<VoteFilter>,
    bucket_count: usize,
) -> LoadOutcome {
    thread::scope(|scope| {
        let comments = scope.spawn(|| remote.list_comments(episode_id));
        let votes = vote_filter
            .as_ref()
            .map(|filter| scope.spawn(move || remote.list_votes(filter)));
        let histogram = scope.spawn(|| remote.get_histogram(episode_id, bucket_count));

        LoadOutcome {
            comments: join_worker(comments),
            votes: votes.map(join_worker),
            histogram: join_worker(histogram),
        }
    })
}

/// Runs one remote call, reporting a panic inside the service as a transport error.
pub(super) fn guarded<T>(call: impl FnOnce() -> Result<T, RemoteError>) -> Result<T, RemoteError> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|_| worker_panicked())
}

fn join_worker<T>(
    handle: thread::ScopedJoinHandle<'_, Result<T, RemoteError>>,
) -> Result<T, RemoteError> {
    handle.join().unwrap_or_else(|_| worker_panicked())
}

fn worker_panicked<T>() -> Result<T, RemoteError> {
    Err(RemoteError::Transport(WORKER_PANICKED.to_string()))
}
