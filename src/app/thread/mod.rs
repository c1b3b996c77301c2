mod tree;
mod votes;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::episode::EpisodeId;
use super::error::ValidationError;
use super::remote::{CommentRecord, NewCommentRecord};
use super::timepoint::Timepoint;

pub(crate) use tree::{CommentTree, NodeKey};
pub(crate) use votes::{VoteChange, VoteDirection, VoteLedger};

pub(crate) const DELETED_AUTHOR_ID: &str = "deleted-user";
pub(crate) const DELETED_AUTHOR_NAME: &str = "[deleted]";
pub(crate) const DELETED_CONTENT: &str = "[this comment has been deleted]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct CommentId(pub(crate) u64);

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Author {
    pub(crate) id: String,
    pub(crate) name: String,
}

/// Whether the server has acknowledged the latest local state of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SyncState {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Comment {
    pub(crate) id: CommentId,
    pub(crate) episode_id: EpisodeId,
    pub(crate) author: Author,
    pub(crate) content: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) modified_at: DateTime<Utc>,
    pub(crate) timepoint: Timepoint,
    pub(crate) up_votes: u32,
    pub(crate) down_votes: u32,
    pub(crate) sync: SyncState,
    parent: Option<NodeKey>,
    replies: Vec<NodeKey>,
}

impl Comment {
    pub(crate) fn from_record(record: &CommentRecord) -> Result<Self, ValidationError> {
        if !record.timepoint.is_finite() || record.timepoint < 0.0 {
            return Err(ValidationError::InvalidRecord(format!(
                "comment {} has timepoint {}",
                record.id, record.timepoint
            )));
        }
        let counter = |value: i64, name: &str| {
            u32::try_from(value).map_err(|_| {
                ValidationError::InvalidRecord(format!(
                    "comment {} has {name} = {value}",
                    record.id
                ))
            })
        };
        Ok(Self {
            id: record.id,
            episode_id: record.episode_id,
            author: Author {
                id: record.author_id.clone(),
                name: record.author_name.clone(),
            },
            content: record.content.clone(),
            created_at: record.created_at,
            modified_at: record.modified_at,
            timepoint: Timepoint::from_secs_f64(record.timepoint),
            up_votes: counter(record.up_votes, "upVotes")?,
            down_votes: counter(record.down_votes, "downVotes")?,
            sync: SyncState::Confirmed,
            parent: None,
            replies: Vec::new(),
        })
    }

    pub(crate) fn to_new_record(&self, parent_id: Option<CommentId>) -> NewCommentRecord {
        NewCommentRecord {
            episode_id: self.episode_id,
            author_id: self.author.id.clone(),
            author_name: self.author.name.clone(),
            content: self.content.clone(),
            timepoint: self.timepoint.seconds() as f64,
            parent_id,
        }
    }

    pub(crate) fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub(crate) fn replies(&self) -> &[NodeKey] {
        &self.replies
    }

    pub(crate) fn is_deleted(&self) -> bool {
        self.author.id == DELETED_AUTHOR_ID && self.content == DELETED_CONTENT
    }

    pub(crate) fn format_approval(&self) -> String {
        let total = u64::from(self.up_votes) + u64::from(self.down_votes);
        if total == 0 {
            return "100%".to_string();
        }
        let percent = (100.0 * f64::from(self.up_votes) / total as f64).round() as u64;
        format!("{percent}%")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(up_votes: i64, down_votes: i64) -> CommentRecord {
        let now = Utc::now();
        CommentRecord {
            id: CommentId(7),
            episode_id: 1,
            author_id: "u-1".to_string(),
            author_name: "Ada".to_string(),
            content: "hello".to_string(),
            created_at: now,
            modified_at: now,
            timepoint: 12.6,
            up_votes,
            down_votes,
            parent_id: None,
        }
    }

    #[test]
    fn approval_is_full_without_votes() {
        let comment = Comment::from_record(&record(0, 0)).expect("valid record");
        assert_eq!(comment.format_approval(), "100%");
    }

    #[test]
    fn approval_rounds_to_whole_percent() {
        let comment = Comment::from_record(&record(2, 1)).expect("valid record");
        assert_eq!(comment.format_approval(), "67%");
        let comment = Comment::from_record(&record(0, 4)).expect("valid record");
        assert_eq!(comment.format_approval(), "0%");
    }

    #[test]
    fn from_record_rounds_timepoint_and_rejects_negative_counters() {
        let comment = Comment::from_record(&record(1, 0)).expect("valid record");
        assert_eq!(comment.timepoint.seconds(), 13);
        assert_eq!(comment.sync, SyncState::Confirmed);
        assert!(matches!(
            Comment::from_record(&record(-1, 0)),
            Err(ValidationError::InvalidRecord(_))
        ));

        let mut bad_time = record(0, 0);
        bad_time.timepoint = f64::INFINITY;
        assert!(Comment::from_record(&bad_time).is_err());
    }
}
