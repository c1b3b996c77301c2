mod pending;

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info, warn};

use super::episode::{Episode, EpisodeId};
use super::error::{RemoteError, ValidationError};
use super::histogram::{CommentDensityHistogram, DEFAULT_BUCKET_COUNT};
use super::remote::{
    CommentPatch, CommentRecord, SharedRemote, VoteCommentRecord, VoteFilter, VoteKey, VotePatch,
};
use super::settings::{UserSettings, WINDOW_DURATION_RANGE};
use super::thread::{
    Author, Comment, CommentId, CommentTree, NodeKey, SyncState, VoteChange, VoteDirection,
    VoteLedger,
};
use super::timepoint::{ParseTimepointError, Timepoint};
use super::window::{AudioFile, AudioWindow, DeviceClass};

use pending::{
    CommentSync, Dispatcher, LoadOutcome, RemoteEvent, VoteSync, fetch_episode_bundle, guarded,
};

pub(crate) const MAX_COMMENT_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Viewer {
    Guest,
    Member(Author),
}

impl Viewer {
    pub(crate) fn member(id: &str, name: &str) -> Self {
        Self::Member(Author {
            id: id.to_string(),
            name: name.to_string(),
        })
    }

    pub(crate) fn author(&self) -> Option<&Author> {
        match self {
            Self::Guest => None,
            Self::Member(author) => Some(author),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    Idle,
    Loading(EpisodeId),
    Ready(EpisodeId),
}

/// One listener's view of one episode: the comment tree, their votes, the
/// density histogram and the visible window, kept in step with the server.
///
/// Mutations apply locally first. Remote calls run on worker threads and
/// their results are applied by [`EpisodeSession::drain`] or
/// [`EpisodeSession::settle`].
pub(crate) struct EpisodeSession {
    viewer: Viewer,
    settings: UserSettings,
    bucket_count: usize,
    state: SessionState,
    generation: u64,
    episode: Option<Episode>,
    window: AudioWindow,
    position: Timepoint,
    tree: CommentTree,
    ledger: VoteLedger,
    histogram: CommentDensityHistogram,
    dispatcher: Dispatcher,
    comment_sync: HashMap<NodeKey, CommentSync>,
    vote_sync: HashMap<NodeKey, VoteSync>,
    placeholders: HashMap<CommentId, NodeKey>,
}

impl EpisodeSession {
    pub(crate) fn new(remote: SharedRemote, viewer: Viewer, settings: UserSettings) -> Self {
        Self {
            viewer,
            settings,
            bucket_count: DEFAULT_BUCKET_COUNT,
            state: SessionState::Idle,
            generation: 0,
            episode: None,
            window: AudioWindow::new(
                AudioFile::default(),
                settings.window_duration(),
                settings.timeslot_count(),
            ),
            position: Timepoint::ZERO,
            tree: CommentTree::new(),
            ledger: VoteLedger::new(),
            histogram: CommentDensityHistogram::empty(DEFAULT_BUCKET_COUNT, 0),
            dispatcher: Dispatcher::new(remote),
            comment_sync: HashMap::new(),
            vote_sync: HashMap::new(),
            placeholders: HashMap::new(),
        }
    }

    /// Fetches episode metadata, then starts loading it.
    pub(crate) fn open_episode(&mut self, id: EpisodeId) -> Result<()> {
        let record = self
            .dispatcher
            .remote()
            .get_episode(id)
            .with_context(|| format!("failed to fetch episode {id}"))?;
        let episode = Episode::from_record(&record)?;
        self.load_episode(episode);
        Ok(())
    }

    pub(crate) fn load_episode(&mut self, episode: Episode) {
        self.generation += 1;
        let generation = self.generation;
        let episode_id = episode.id;
        info!(
            "loading episode {episode_id} \"{}\" ({}s)",
            episode.title,
            episode.duration()
        );

        self.state = SessionState::Loading(episode_id);
        self.window = AudioWindow::new(
            episode.audio.clone(),
            self.settings.window_duration(),
            self.settings.timeslot_count(),
        );
        self.position = Timepoint::ZERO;
        self.tree = CommentTree::new();
        self.ledger = VoteLedger::new();
        self.histogram = CommentDensityHistogram::empty(self.bucket_count, episode.duration());
        self.comment_sync.clear();
        self.vote_sync.clear();
        self.placeholders.clear();

        let vote_filter = self.viewer.author().map(|author| VoteFilter {
            user_id: author.id.clone(),
            episode_id,
        });
        if vote_filter.is_none() {
            debug!("guest viewer; not fetching vote records");
        }
        let bucket_count = self.bucket_count;
        self.dispatcher.spawn(move |remote| RemoteEvent::Loaded {
            generation,
            episode_id,
            outcome: fetch_episode_bundle(remote, episode_id, vote_filter, bucket_count),
        });
        self.episode = Some(episode);
    }

    /// Applies every remote result that has already arrived.
    pub(crate) fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.dispatcher.try_next() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Blocks until no remote call is outstanding, including the ones
    /// issued while applying results.
    pub(crate) fn settle(&mut self) {
        while let Some(event) = self.dispatcher.next_blocking() {
            self.apply(event);
        }
    }

    /// Moves the play head. Targets outside the episode are replaced by the
    /// current window start.
    pub(crate) fn seek_to(&mut self, seconds: f64) -> Timepoint {
        let Some(duration) = self.episode.as_ref().map(Episode::duration) else {
            warn!("seek to {seconds}s ignored: no episode loaded");
            return self.position;
        };

        let target = if !seconds.is_finite() || seconds < 0.0 {
            warn!("{}", ValidationError::NegativeSeek(seconds));
            self.window.start
        } else if seconds > duration as f64 {
            warn!(
                "{}",
                ValidationError::SeekPastEnd {
                    target: seconds,
                    duration
                }
            );
            self.window.start
        } else {
            Timepoint::from_secs_f64(seconds)
        };

        self.position = target;
        if !self.window.contains_timepoint(target) {
            let start = self.window.find_window_start_for_time(target);
            debug!("window follows play head to {}", Timepoint::from_secs(start));
            self.window.move_to(start);
        }
        target
    }

    pub(crate) fn seek_to_token(&mut self, token: &str) -> Result<Timepoint, ParseTimepointError> {
        let target = Timepoint::parse_from_url_token(token)?;
        Ok(self.seek_to(target.seconds() as f64))
    }

    /// Posts at the current play head, as a thread root or a reply.
    pub(crate) fn post_comment(
        &mut self,
        parent: Option<CommentId>,
        content: &str,
    ) -> Result<CommentId, ValidationError> {
        let author = self.require_author()?;
        let episode_id = self.ready_episode()?;
        let content = validate_content(content)?;
        let id = self.tree.create_local(
            episode_id,
            author,
            &content,
            self.position,
            parent,
            Utc::now(),
        )?;
        self.histogram.record(self.position);
        debug!("posted comment {id} at {}", self.position);

        if let Some(key) = self.tree.key_of(id) {
            self.placeholders.insert(id, key);
            self.comment_sync.insert(key, CommentSync::default());
            self.flush_comment(key);
        }
        Ok(id)
    }

    pub(crate) fn edit_comment(&mut self, id: CommentId, content: &str) -> Result<(), ValidationError> {
        let author = self.require_author()?;
        self.ready_episode()?;
        let content = validate_content(content)?;
        let key = self.owned_key(id, &author)?;
        self.tree.edit_content(id, &content, Utc::now());
        self.mark_dirty(key, |sync| sync.content_dirty = true);
        Ok(())
    }

    pub(crate) fn delete_comment(&mut self, id: CommentId) -> Result<(), ValidationError> {
        let author = self.require_author()?;
        self.ready_episode()?;
        let key = self.owned_key(id, &author)?;
        self.tree.soft_delete(id);
        self.mark_dirty(key, |sync| {
            sync.delete_pending = true;
            sync.content_dirty = false;
        });
        Ok(())
    }

    pub(crate) fn vote(&mut self, id: CommentId, positive: bool) -> Result<VoteChange, ValidationError> {
        self.require_author()?;
        self.ready_episode()?;
        let key = self
            .tree
            .key_of(id)
            .ok_or(ValidationError::UnknownComment(id))?;
        let comment = self
            .tree
            .node_mut(key)
            .ok_or(ValidationError::UnknownComment(id))?;
        let change = self.ledger.cast_vote(comment, positive);
        debug!("vote on comment {id}: {change:?}");
        self.flush_vote(key);
        Ok(change)
    }

    /// Re-reads one comment from the server. Local changes still on their
    /// way out win over the fetched copy.
    pub(crate) fn refresh_comment(&mut self, id: CommentId) -> Result<(), ValidationError> {
        self.ready_episode()?;
        let key = self
            .tree
            .key_of(id)
            .ok_or(ValidationError::UnknownComment(id))?;
        if !self.is_created(key) {
            debug!("comment {id} is not on the server yet; nothing to refresh");
            return Ok(());
        }
        let generation = self.generation;
        self.dispatcher.spawn(move |remote| RemoteEvent::CommentFetched {
            generation,
            key,
            result: guarded(|| remote.get_comment(id)),
        });
        Ok(())
    }

    pub(crate) fn resize_window(&mut self, duration: u64) -> Result<(), ValidationError> {
        if !WINDOW_DURATION_RANGE.contains(&duration) {
            return Err(ValidationError::WindowDuration(duration));
        }
        let duration = duration.min(self.window.audio_file.duration);
        self.window.resize(duration);
        Ok(())
    }

    /// Shifts the window by one timeslot, staying inside the episode.
    pub(crate) fn step_window(&mut self, forward: bool) -> Timepoint {
        let step = self.window.timeslot_duration().max(1) as i64;
        let start = self.window.start.seconds() as i64;
        let target = if forward { start + step } else { start - step };
        let start = self.window.clamp_start(target);
        self.window.move_to(start);
        self.window.start
    }

    pub(crate) fn set_timeslot_duration(&mut self, seconds: u64) {
        if seconds == 0 {
            warn!("ignoring zero-length timeslot");
        }
        self.window.set_timeslot_duration(seconds);
    }

    pub(crate) fn apply_device_class(&mut self, class: DeviceClass) {
        self.window.timeslot_count = class.timeslot_count();
    }

    /// Thread roots inside the window, one list per timeslot, each ordered by timepoint.
    pub(crate) fn comments_by_timeslot(&self) -> Vec<Vec<&Comment>> {
        let mut slots: Vec<Vec<&Comment>> =
            vec![Vec::new(); self.window.timeslot_count.max(1) as usize];
        for comment in self.tree.roots() {
            if let Some(index) = self.window.timeslot_index(comment.timepoint) {
                slots[index].push(comment);
            }
        }
        for slot in &mut slots {
            slot.sort_by_key(|comment| comment.timepoint);
        }
        slots
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn episode(&self) -> Option<&Episode> {
        self.episode.as_ref()
    }

    pub(crate) fn window(&self) -> &AudioWindow {
        &self.window
    }

    pub(crate) fn position(&self) -> Timepoint {
        self.position
    }

    pub(crate) fn tree(&self) -> &CommentTree {
        &self.tree
    }

    pub(crate) fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    pub(crate) fn histogram(&self) -> &CommentDensityHistogram {
        &self.histogram
    }

    /// The id a posted comment carries now: the server's once its create
    /// has been acknowledged, otherwise the placeholder itself.
    pub(crate) fn current_id(&self, posted: CommentId) -> Option<CommentId> {
        let key = self.placeholders.get(&posted)?;
        self.tree.node(*key).map(|comment| comment.id)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    fn require_author(&self) -> Result<Author, ValidationError> {
        self.viewer
            .author()
            .cloned()
            .ok_or(ValidationError::GuestWrite)
    }

    fn ready_episode(&self) -> Result<EpisodeId, ValidationError> {
        match self.state {
            SessionState::Ready(id) => Ok(id),
            _ => Err(ValidationError::NotReady),
        }
    }

    fn owned_key(&self, id: CommentId, author: &Author) -> Result<NodeKey, ValidationError> {
        let key = self
            .tree
            .key_of(id)
            .ok_or(ValidationError::UnknownComment(id))?;
        match self.tree.node(key) {
            Some(comment) if comment.author.id == author.id => Ok(key),
            _ => Err(ValidationError::NotAuthor(id)),
        }
    }

    fn is_created(&self, key: NodeKey) -> bool {
        self.comment_sync
            .get(&key)
            .is_none_or(|sync| sync.created)
    }

    fn mark_dirty(&mut self, key: NodeKey, update: impl FnOnce(&mut CommentSync)) {
        let sync = self
            .comment_sync
            .entry(key)
            .or_insert_with(CommentSync::confirmed);
        update(sync);
        let created = sync.created;
        // A comment whose create failed stays failed.
        if let Some(comment) = self.tree.node_mut(key)
            && (created || comment.sync != SyncState::Failed)
        {
            comment.sync = SyncState::Pending;
        }
        self.flush_comment(key);
    }

    fn apply(&mut self, event: RemoteEvent) {
        if event.generation() != self.generation {
            debug!(
                "discarding remote result from load generation {} (current {})",
                event.generation(),
                self.generation
            );
            return;
        }
        match event {
            RemoteEvent::Loaded {
                episode_id,
                outcome,
                ..
            } => self.finish_load(episode_id, outcome),
            RemoteEvent::CommentCreated { key, result, .. } => self.on_comment_created(key, result),
            RemoteEvent::CommentWritten {
                key,
                action,
                result,
                ..
            } => self.on_comment_written(key, action, result),
            RemoteEvent::CommentFetched { key, result, .. } => self.on_comment_fetched(key, result),
            RemoteEvent::VoteSynced {
                key,
                target,
                result,
                ..
            } => self.on_vote_synced(key, target, result),
        }
    }

    fn finish_load(&mut self, episode_id: EpisodeId, outcome: LoadOutcome) {
        let Some(duration) = self
            .episode
            .as_ref()
            .filter(|episode| episode.id == episode_id)
            .map(Episode::duration)
        else {
            debug!("discarding load result for episode {episode_id}");
            return;
        };

        let records = outcome.comments.unwrap_or_else(|err| {
            warn!("failed to load comments for episode {episode_id}: {err}");
            Vec::new()
        });
        self.tree = CommentTree::from_records(&records);

        self.ledger = match (self.viewer.author(), outcome.votes) {
            (Some(author), Some(Ok(votes))) => VoteLedger::from_records(&votes, &author.id),
            (_, Some(Err(err))) => {
                warn!("failed to load votes for episode {episode_id}: {err}");
                VoteLedger::new()
            }
            _ => VoteLedger::new(),
        };
        let dropped = self.ledger.retain_known(&self.tree);
        if dropped > 0 {
            debug!("ignored {dropped} votes on comments outside episode {episode_id}");
        }
        self.vote_sync = self
            .tree
            .iter()
            .filter_map(|comment| {
                let server = self.ledger.vote_of(comment.id)?;
                let key = self.tree.key_of(comment.id)?;
                Some((
                    key,
                    VoteSync {
                        in_flight: false,
                        server: Some(server),
                    },
                ))
            })
            .collect();

        self.histogram = match outcome.histogram {
            Ok(record) if record.bucket_count != self.bucket_count => {
                warn!(
                    "server sent {} histogram buckets instead of {}; counting loaded comments",
                    record.bucket_count, self.bucket_count
                );
                CommentDensityHistogram::from_tree(&self.tree, duration, self.bucket_count)
            }
            Ok(record) => {
                if record.x_axis.len() != record.y_axis.len() {
                    warn!(
                        "histogram axes differ in length ({} vs {}); extra entries ignored",
                        record.x_axis.len(),
                        record.y_axis.len()
                    );
                }
                let mut histogram = CommentDensityHistogram::from_sparse(
                    &record.pairs(),
                    record.bucket_count,
                    duration,
                );
                histogram.repad(duration, self.bucket_count);
                histogram
            }
            Err(err) => {
                warn!("failed to load histogram for episode {episode_id}: {err}; counting loaded comments");
                CommentDensityHistogram::from_tree(&self.tree, duration, self.bucket_count)
            }
        };

        self.state = SessionState::Ready(episode_id);
        info!(
            "episode {episode_id} ready: {} comments, {} votes",
            self.tree.len(),
            self.ledger.len()
        );
    }

    /// Sends the next outstanding write for a comment, if nothing is in flight for it.
    fn flush_comment(&mut self, key: NodeKey) {
        let Some(comment) = self.tree.node(key) else {
            return;
        };
        let sync = self
            .comment_sync
            .get(&key)
            .copied()
            .unwrap_or_else(CommentSync::confirmed);
        if sync.in_flight {
            return;
        }
        let generation = self.generation;

        if !sync.created {
            if comment.sync == SyncState::Failed {
                debug!("comment {} never reached the server; not sending changes", comment.id);
                return;
            }
            let parent_id = match comment.parent() {
                Some(parent) if !self.is_created(parent) => {
                    debug!("holding reply {} until its parent is created", comment.id);
                    return;
                }
                Some(parent) => self.tree.node(parent).map(|parent| parent.id),
                None => None,
            };
            let payload = comment.to_new_record(parent_id);
            self.comment_sync.insert(
                key,
                CommentSync {
                    in_flight: true,
                    content_dirty: false,
                    ..sync
                },
            );
            self.dispatcher.spawn(move |remote| RemoteEvent::CommentCreated {
                generation,
                key,
                result: guarded(|| remote.create_comment(&payload)),
            });
            return;
        }

        let id = comment.id;
        if sync.delete_pending {
            self.comment_sync.insert(
                key,
                CommentSync {
                    in_flight: true,
                    content_dirty: false,
                    delete_pending: false,
                    ..sync
                },
            );
            self.dispatcher.spawn(move |remote| RemoteEvent::CommentWritten {
                generation,
                key,
                action: "delete",
                result: guarded(|| remote.delete_comment(id)),
            });
        } else if sync.content_dirty {
            let patch = CommentPatch {
                content: comment.content.clone(),
            };
            self.comment_sync.insert(
                key,
                CommentSync {
                    in_flight: true,
                    content_dirty: false,
                    ..sync
                },
            );
            self.dispatcher.spawn(move |remote| RemoteEvent::CommentWritten {
                generation,
                key,
                action: "edit",
                result: guarded(|| remote.update_comment(id, &patch)),
            });
        }
    }

    /// Brings the server's copy of the viewer's vote in line with the ledger.
    fn flush_vote(&mut self, key: NodeKey) {
        let Some(author) = self.viewer.author() else {
            return;
        };
        let Some(episode_id) = self.episode.as_ref().map(|episode| episode.id) else {
            return;
        };
        if !self.is_created(key) {
            return;
        }
        let Some(comment) = self.tree.node(key) else {
            return;
        };
        let sync = self.vote_sync.get(&key).copied().unwrap_or_default();
        let desired = self.ledger.vote_of(comment.id);
        if sync.in_flight || sync.server == desired {
            return;
        }

        let vote_key = VoteKey {
            user_id: author.id.clone(),
            comment_id: comment.id,
        };
        let server = sync.server;
        let generation = self.generation;
        self.vote_sync.insert(
            key,
            VoteSync {
                in_flight: true,
                server,
            },
        );
        self.dispatcher.spawn(move |remote| {
            let result = guarded(|| match (server, desired) {
                (None, Some(direction)) => remote
                    .create_vote(&VoteCommentRecord {
                        comment_id: vote_key.comment_id,
                        user_id: vote_key.user_id.clone(),
                        episode_id,
                        was_vote_positive: direction.is_positive(),
                        date: Utc::now(),
                    })
                    .map(drop),
                (Some(_), Some(direction)) => remote.update_vote(
                    &vote_key,
                    &VotePatch {
                        was_vote_positive: direction.is_positive(),
                    },
                ),
                (Some(_), None) => remote.delete_vote(&vote_key),
                (None, None) => Ok(()),
            });
            RemoteEvent::VoteSynced {
                generation,
                key,
                target: desired,
                result,
            }
        });
    }

    fn on_comment_created(&mut self, key: NodeKey, result: Result<CommentRecord, RemoteError>) {
        let Some(placeholder) = self.tree.node(key).map(|comment| comment.id) else {
            return;
        };
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                warn!("failed to create comment {placeholder}: {err}");
                self.abandon_uncreated(key);
                return;
            }
        };
        if !self.tree.reconcile_server_id(key, record.id) {
            self.abandon_uncreated(key);
            return;
        }
        self.ledger.rekey(placeholder, record.id);
        debug!("comment {placeholder} confirmed as {}", record.id);

        let sync = self
            .comment_sync
            .entry(key)
            .or_insert_with(CommentSync::confirmed);
        sync.created = true;
        sync.in_flight = false;
        let outstanding = sync.content_dirty || sync.delete_pending;
        if outstanding && let Some(comment) = self.tree.node_mut(key) {
            comment.sync = SyncState::Pending;
        }

        self.flush_comment(key);
        self.flush_vote(key);
        let replies = self
            .tree
            .node(key)
            .map(|comment| comment.replies().to_vec())
            .unwrap_or_default();
        for reply in replies {
            self.flush_comment(reply);
        }
    }

    /// Marks a comment whose create failed, and every reply still waiting on
    /// it, as failed. Their queued changes are dropped.
    fn abandon_uncreated(&mut self, key: NodeKey) {
        let mut stack = vec![key];
        let mut abandoned = 0;
        while let Some(current) = stack.pop() {
            let created = self.is_created(current);
            if let Some(sync) = self.comment_sync.get_mut(&current) {
                sync.in_flight = false;
            }
            let Some(comment) = self.tree.node_mut(current) else {
                continue;
            };
            if !created {
                comment.sync = SyncState::Failed;
                abandoned += 1;
            }
            stack.extend_from_slice(comment.replies());
        }
        warn!("{abandoned} comment(s) were not saved; later changes to them stay local");
    }

    fn on_comment_written(&mut self, key: NodeKey, action: &str, result: Result<(), RemoteError>) {
        let sync = self
            .comment_sync
            .entry(key)
            .or_insert_with(CommentSync::confirmed);
        sync.in_flight = false;
        let outstanding = sync.content_dirty || sync.delete_pending;
        let Some(comment) = self.tree.node_mut(key) else {
            return;
        };
        match result {
            Ok(()) => {
                debug!("{action} of comment {} acknowledged", comment.id);
                if !outstanding {
                    comment.sync = SyncState::Confirmed;
                }
            }
            Err(err) => {
                warn!("failed to {action} comment {}: {err}", comment.id);
                comment.sync = SyncState::Failed;
            }
        }
        self.flush_comment(key);
    }

    fn on_comment_fetched(&mut self, key: NodeKey, result: Result<CommentRecord, RemoteError>) {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                warn!("failed to refresh comment: {err}");
                return;
            }
        };
        let fresh = match Comment::from_record(&record) {
            Ok(fresh) => fresh,
            Err(err) => {
                warn!("ignoring refreshed comment: {err}");
                return;
            }
        };

        let writes_outstanding = self
            .comment_sync
            .get(&key)
            .is_some_and(|sync| sync.in_flight || sync.content_dirty || sync.delete_pending);
        let desired = self.ledger.vote_of(fresh.id);
        let vote_outstanding = self
            .vote_sync
            .get(&key)
            .map_or(desired.is_some(), |sync| sync.in_flight || sync.server != desired);

        let Some(comment) = self.tree.node_mut(key) else {
            return;
        };
        if !writes_outstanding {
            comment.author = fresh.author;
            comment.content = fresh.content;
            comment.modified_at = fresh.modified_at;
            comment.sync = SyncState::Confirmed;
        }
        if !vote_outstanding {
            comment.up_votes = fresh.up_votes;
            comment.down_votes = fresh.down_votes;
        }
    }

    fn on_vote_synced(
        &mut self,
        key: NodeKey,
        target: Option<VoteDirection>,
        result: Result<(), RemoteError>,
    ) {
        let server = self.vote_sync.get(&key).and_then(|sync| sync.server);
        let comment_id = self.tree.node(key).map(|comment| comment.id);
        let server = match result {
            Ok(()) => target,
            Err(RemoteError::NotFound { resource: "vote", .. }) => {
                debug!("server holds no vote on comment {comment_id:?}; recreating it");
                None
            }
            Err(err) if err.is_not_found() => {
                warn!("comment {comment_id:?} is gone from the server: {err}");
                if let Some(id) = comment_id {
                    self.ledger.revert_vote(id);
                }
                self.vote_sync.insert(
                    key,
                    VoteSync {
                        in_flight: false,
                        server: None,
                    },
                );
                return;
            }
            Err(err) => {
                warn!("failed to save vote on comment {comment_id:?}: {err}");
                self.vote_sync.insert(
                    key,
                    VoteSync {
                        in_flight: false,
                        server,
                    },
                );
                if let Some(comment) = self.tree.node_mut(key) {
                    comment.sync = SyncState::Failed;
                }
                return;
            }
        };
        self.vote_sync.insert(
            key,
            VoteSync {
                in_flight: false,
                server,
            },
        );
        self.flush_vote(key);
    }
}

fn validate_content(content: &str) -> Result<String, ValidationError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyComment);
    }
    let len = trimmed.chars().count();
    if len > MAX_COMMENT_CHARS {
        return Err(ValidationError::CommentTooLong {
            len,
            max: MAX_COMMENT_CHARS,
        });
    }
    Ok(trimmed.to_string())
}
