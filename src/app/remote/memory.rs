use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use super::super::episode::EpisodeId;
use super::super::error::RemoteError;
use super::super::histogram::CommentDensityHistogram;
use super::super::thread::{CommentId, DELETED_AUTHOR_ID, DELETED_AUTHOR_NAME, DELETED_CONTENT};
use super::super::timepoint::Timepoint;
use super::{
    CommentPatch, CommentRecord, EpisodeRecord, HistogramRecord, NewCommentRecord, RemoteService,
    VoteCommentRecord, VoteFilter, VoteKey, VotePatch,
};

#[derive(Default)]
struct State {
    episodes: HashMap<EpisodeId, EpisodeRecord>,
    comments: Vec<CommentRecord>,
    votes: HashMap<VoteKey, VoteCommentRecord>,
    next_comment_id: u64,
    failing_writes: bool,
    panicking_writes: bool,
    histogram_buckets: Option<usize>,
    calls: Vec<String>,
}

/// In-process comment server for tests. Maintains vote counters the way the
/// real server does.
#[derive(Default)]
pub(crate) struct MemoryRemote {
    state: Mutex<State>,
}

impl MemoryRemote {
    pub(crate) fn new() -> Self {
        let remote = Self::default();
        remote.lock().next_comment_id = 1000;
        remote
    }

    pub(crate) fn with_episode(self, id: EpisodeId, title: &str, duration: f64) -> Self {
        self.lock().episodes.insert(
            id,
            EpisodeRecord {
                id,
                title: title.to_string(),
                audio_url: format!("https://cdn.test/{id}.mp3"),
                duration,
            },
        );
        self
    }

    pub(crate) fn with_comment(
        self,
        id: u64,
        episode_id: EpisodeId,
        parent_id: Option<u64>,
        seconds: f64,
        content: &str,
    ) -> Self {
        let now = Utc::now();
        self.lock().comments.push(CommentRecord {
            id: CommentId(id),
            episode_id,
            author_id: "seed-author".to_string(),
            author_name: "Seed Author".to_string(),
            content: content.to_string(),
            created_at: now,
            modified_at: now,
            timepoint: seconds,
            up_votes: 0,
            down_votes: 0,
            parent_id: parent_id.map(CommentId),
        });
        self
    }

    pub(crate) fn with_vote(self, user_id: &str, comment_id: u64, positive: bool) -> Self {
        let record = {
            let state = self.lock();
            let episode_id = state
                .comments
                .iter()
                .find(|comment| comment.id == CommentId(comment_id))
                .map(|comment| comment.episode_id)
                .unwrap_or_default();
            VoteCommentRecord {
                comment_id: CommentId(comment_id),
                user_id: user_id.to_string(),
                episode_id,
                was_vote_positive: positive,
                date: Utc::now(),
            }
        };
        self.create_vote(&record).expect("seed vote");
        self.lock().calls.clear();
        self
    }

    pub(crate) fn set_failing_writes(&self, failing: bool) {
        self.lock().failing_writes = failing;
    }

    /// Writes panic inside the service instead of returning an error.
    pub(crate) fn set_panicking_writes(&self, panicking: bool) {
        self.lock().panicking_writes = panicking;
    }

    /// Answers histogram requests with this many buckets whatever was asked for.
    pub(crate) fn set_histogram_buckets(&self, bucket_count: usize) {
        self.lock().histogram_buckets = Some(bucket_count);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub(crate) fn comment(&self, id: u64) -> Option<CommentRecord> {
        self.lock()
            .comments
            .iter()
            .find(|comment| comment.id == CommentId(id))
            .cloned()
    }

    pub(crate) fn comment_count(&self) -> usize {
        self.lock().comments.len()
    }

    pub(crate) fn vote(&self, user_id: &str, comment_id: u64) -> Option<VoteCommentRecord> {
        self.lock()
            .votes
            .get(&VoteKey {
                user_id: user_id.to_string(),
                comment_id: CommentId(comment_id),
            })
            .cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("memory remote lock")
    }

    fn begin(&self, call: String, write: bool) -> Result<std::sync::MutexGuard<'_, State>, RemoteError> {
        let mut state = self.lock();
        state.calls.push(call);
        if write && state.panicking_writes {
            drop(state);
            panic!("memory remote write blew up");
        }
        if write && state.failing_writes {
            return Err(RemoteError::Status {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(state)
    }
}

fn comment_mut(state: &mut State, id: CommentId) -> Result<&mut CommentRecord, RemoteError> {
    state
        .comments
        .iter_mut()
        .find(|comment| comment.id == id)
        .ok_or_else(|| RemoteError::not_found("comment", id))
}

impl RemoteService for MemoryRemote {
    fn get_episode(&self, id: EpisodeId) -> Result<EpisodeRecord, RemoteError> {
        let state = self.begin(format!("get_episode {id}"), false)?;
        state
            .episodes
            .get(&id)
            .cloned()
            .ok_or_else(|| RemoteError::not_found("episode", id))
    }

    fn list_comments(&self, episode_id: EpisodeId) -> Result<Vec<CommentRecord>, RemoteError> {
        let state = self.begin(format!("list_comments {episode_id}"), false)?;
        Ok(state
            .comments
            .iter()
            .filter(|comment| comment.episode_id == episode_id)
            .cloned()
            .collect())
    }

    fn get_comment(&self, id: CommentId) -> Result<CommentRecord, RemoteError> {
        let mut state = self.begin(format!("get_comment {id}"), false)?;
        comment_mut(&mut state, id).map(|comment| comment.clone())
    }

    fn create_comment(&self, payload: &NewCommentRecord) -> Result<CommentRecord, RemoteError> {
        let mut state = self.begin(format!("create_comment {}", payload.content), true)?;
        let id = CommentId(state.next_comment_id);
        state.next_comment_id += 1;
        let now = Utc::now();
        let record = CommentRecord {
            id,
            episode_id: payload.episode_id,
            author_id: payload.author_id.clone(),
            author_name: payload.author_name.clone(),
            content: payload.content.clone(),
            created_at: now,
            modified_at: now,
            timepoint: payload.timepoint,
            up_votes: 0,
            down_votes: 0,
            parent_id: payload.parent_id,
        };
        state.comments.push(record.clone());
        Ok(record)
    }

    fn update_comment(&self, id: CommentId, patch: &CommentPatch) -> Result<(), RemoteError> {
        let mut state = self.begin(format!("update_comment {id}"), true)?;
        let comment = comment_mut(&mut state, id)?;
        comment.content = patch.content.clone();
        comment.modified_at = Utc::now();
        Ok(())
    }

    fn delete_comment(&self, id: CommentId) -> Result<(), RemoteError> {
        let mut state = self.begin(format!("delete_comment {id}"), true)?;
        let comment = comment_mut(&mut state, id)?;
        comment.author_id = DELETED_AUTHOR_ID.to_string();
        comment.author_name = DELETED_AUTHOR_NAME.to_string();
        comment.content = DELETED_CONTENT.to_string();
        Ok(())
    }

    fn list_votes(&self, filter: &VoteFilter) -> Result<Vec<VoteCommentRecord>, RemoteError> {
        let state = self.begin(format!("list_votes {}", filter.user_id), false)?;
        Ok(state
            .votes
            .values()
            .filter(|vote| vote.user_id == filter.user_id && vote.episode_id == filter.episode_id)
            .cloned()
            .collect())
    }

    fn create_vote(&self, record: &VoteCommentRecord) -> Result<VoteCommentRecord, RemoteError> {
        let mut state = self.begin(format!("create_vote {}", record.comment_id), true)?;
        if state.votes.contains_key(&record.key()) {
            return Err(RemoteError::Application("vote already exists".to_string()));
        }
        let comment = comment_mut(&mut state, record.comment_id)?;
        if record.was_vote_positive {
            comment.up_votes += 1;
        } else {
            comment.down_votes += 1;
        }
        state.votes.insert(record.key(), record.clone());
        Ok(record.clone())
    }

    fn update_vote(&self, key: &VoteKey, patch: &VotePatch) -> Result<(), RemoteError> {
        let mut state = self.begin(format!("update_vote {}", key.comment_id), true)?;
        let previous = state
            .votes
            .get(key)
            .map(|vote| vote.was_vote_positive)
            .ok_or_else(|| RemoteError::not_found("vote", key.comment_id))?;
        if previous != patch.was_vote_positive {
            let comment = comment_mut(&mut state, key.comment_id)?;
            if patch.was_vote_positive {
                comment.up_votes += 1;
                comment.down_votes -= 1;
            } else {
                comment.up_votes -= 1;
                comment.down_votes += 1;
            }
        }
        if let Some(vote) = state.votes.get_mut(key) {
            vote.was_vote_positive = patch.was_vote_positive;
            vote.date = Utc::now();
        }
        Ok(())
    }

    fn delete_vote(&self, key: &VoteKey) -> Result<(), RemoteError> {
        let mut state = self.begin(format!("delete_vote {}", key.comment_id), true)?;
        let removed = state
            .votes
            .remove(key)
            .ok_or_else(|| RemoteError::not_found("vote", key.comment_id))?;
        let comment = comment_mut(&mut state, key.comment_id)?;
        if removed.was_vote_positive {
            comment.up_votes -= 1;
        } else {
            comment.down_votes -= 1;
        }
        Ok(())
    }

    fn get_histogram(
        &self,
        episode_id: EpisodeId,
        bucket_count: usize,
    ) -> Result<HistogramRecord, RemoteError> {
        let state = self.begin(format!("get_histogram {episode_id}"), false)?;
        let bucket_count = state.histogram_buckets.unwrap_or(bucket_count);
        let episode = state
            .episodes
            .get(&episode_id)
            .ok_or_else(|| RemoteError::not_found("episode", episode_id))?;
        let stamps = state
            .comments
            .iter()
            .filter(|comment| comment.episode_id == episode_id)
            .map(|comment| Timepoint::from_secs_f64(comment.timepoint));
        let sparse = CommentDensityHistogram::aggregate(
            stamps,
            episode.duration.round() as u64,
            bucket_count,
        );
        Ok(HistogramRecord {
            bucket_count,
            x_axis: sparse.iter().map(|&(index, _)| index).collect(),
            y_axis: sparse.iter().map(|&(_, count)| count).collect(),
        })
    }
}
