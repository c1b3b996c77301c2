mod api;
#[cfg(test)]
pub(crate) mod memory;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::episode::EpisodeId;
use super::error::RemoteError;
use super::thread::CommentId;

pub(crate) use api::HttpRemote;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EpisodeRecord {
    pub(crate) id: EpisodeId,
    pub(crate) title: String,
    pub(crate) audio_url: String,
    /// Seconds.
    pub(crate) duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommentRecord {
    pub(crate) id: CommentId,
    pub(crate) episode_id: EpisodeId,
    pub(crate) author_id: String,
    pub(crate) author_name: String,
    pub(crate) content: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) modified_at: DateTime<Utc>,
    /// Seconds from the start of the episode.
    pub(crate) timepoint: f64,
    #[serde(default)]
    pub(crate) up_votes: i64,
    #[serde(default)]
    pub(crate) down_votes: i64,
    #[serde(default)]
    pub(crate) parent_id: Option<CommentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewCommentRecord {
    pub(crate) episode_id: EpisodeId,
    pub(crate) author_id: String,
    pub(crate) author_name: String,
    pub(crate) content: String,
    pub(crate) timepoint: f64,
    pub(crate) parent_id: Option<CommentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommentPatch {
    pub(crate) content: String,
}

/// A vote row is identified by who voted on what; there is at most one per pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VoteKey {
    pub(crate) user_id: String,
    pub(crate) comment_id: CommentId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VoteCommentRecord {
    pub(crate) comment_id: CommentId,
    pub(crate) user_id: String,
    pub(crate) episode_id: EpisodeId,
    pub(crate) was_vote_positive: bool,
    pub(crate) date: DateTime<Utc>,
}

#[cfg(test)]
impl VoteCommentRecord {
    pub(crate) fn key(&self) -> VoteKey {
        VoteKey {
            user_id: self.user_id.clone(),
            comment_id: self.comment_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VoteFilter {
    pub(crate) user_id: String,
    pub(crate) episode_id: EpisodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VotePatch {
    pub(crate) was_vote_positive: bool,
}

/// Sparse histogram as aggregated by the server: only non-empty buckets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HistogramRecord {
    pub(crate) bucket_count: usize,
    pub(crate) x_axis: Vec<usize>,
    pub(crate) y_axis: Vec<u32>,
}

impl HistogramRecord {
    pub(crate) fn pairs(&self) -> Vec<(usize, u32)> {
        self.x_axis
            .iter()
            .copied()
            .zip(self.y_axis.iter().copied())
            .collect()
    }
}

pub(crate) type SharedRemote = Arc<dyn RemoteService>;

/// The comment server. Every call blocks; the session runs them off the
/// caller's thread.
pub(crate) trait RemoteService: Send + Sync + 'static {
    fn get_episode(&self, id: EpisodeId) -> Result<EpisodeRecord, RemoteError>;

    fn list_comments(&self, episode_id: EpisodeId) -> Result<Vec<CommentRecord>, RemoteError>;
    fn get_comment(&self, id: CommentId) -> Result<CommentRecord, RemoteError>;
    fn create_comment(&self, payload: &NewCommentRecord) -> Result<CommentRecord, RemoteError>;
    fn update_comment(&self, id: CommentId, patch: &CommentPatch) -> Result<(), RemoteError>;
    /// Server-side soft delete.
    fn delete_comment(&self, id: CommentId) -> Result<(), RemoteError>;

    fn list_votes(&self, filter: &VoteFilter) -> Result<Vec<VoteCommentRecord>, RemoteError>;
    fn create_vote(&self, record: &VoteCommentRecord) -> Result<VoteCommentRecord, RemoteError>;
    fn update_vote(&self, key: &VoteKey, patch: &VotePatch) -> Result<(), RemoteError>;
    fn delete_vote(&self, key: &VoteKey) -> Result<(), RemoteError>;

    fn get_histogram(
        &self,
        episode_id: EpisodeId,
        bucket_count: usize,
    ) -> Result<HistogramRecord, RemoteError>;
}
