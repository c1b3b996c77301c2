use std::collections::HashSet;

use log::{debug, warn};

use super::super::remote::VoteCommentRecord;
use super::{Comment, CommentId, CommentTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub(crate) fn from_positive(positive: bool) -> Self {
        if positive { Self::Up } else { Self::Down }
    }

    pub(crate) fn is_positive(self) -> bool {
        matches!(self, Self::Up)
    }
}

/// What a cast did to the viewer's vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VoteChange {
    Cast(VoteDirection),
    Withdrawn(VoteDirection),
    Switched { to: VoteDirection },
}

/// The viewer's own votes. A comment id sits in at most one of the two sets.
#[derive(Debug, Clone, Default)]
pub(crate) struct VoteLedger {
    upvoted: HashSet<CommentId>,
    downvoted: HashSet<CommentId>,
}

impl VoteLedger {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the ledger from server rows. Rows of other users are ignored;
    /// a repeated `(user, comment)` pair keeps the last row.
    pub(crate) fn from_records(records: &[VoteCommentRecord], user_id: &str) -> Self {
        let mut ledger = Self::new();
        for record in records {
            if record.user_id != user_id {
                debug!(
                    "ignoring vote on {} by {} while loading votes for {user_id}",
                    record.comment_id, record.user_id
                );
                continue;
            }
            if ledger.revert_vote(record.comment_id).is_some() {
                warn!(
                    "duplicate vote records for comment {}; keeping the latest",
                    record.comment_id
                );
            }
            if record.was_vote_positive {
                ledger.upvoted.insert(record.comment_id);
            } else {
                ledger.downvoted.insert(record.comment_id);
            }
        }
        ledger
    }

    /// Repeating the current direction withdraws the vote; the opposite
    /// direction switches it in one step.
    pub(crate) fn cast_vote(&mut self, comment: &mut Comment, positive: bool) -> VoteChange {
        let requested = VoteDirection::from_positive(positive);
        let id = comment.id;

        if self.upvoted.remove(&id) {
            comment.up_votes = comment.up_votes.saturating_sub(1);
            if requested == VoteDirection::Down {
                self.downvoted.insert(id);
                comment.down_votes += 1;
                return VoteChange::Switched { to: requested };
            }
            return VoteChange::Withdrawn(VoteDirection::Up);
        }

        if self.downvoted.remove(&id) {
            comment.down_votes = comment.down_votes.saturating_sub(1);
            if requested == VoteDirection::Up {
                self.upvoted.insert(id);
                comment.up_votes += 1;
                return VoteChange::Switched { to: requested };
            }
            return VoteChange::Withdrawn(VoteDirection::Down);
        }

        match requested {
            VoteDirection::Up => {
                self.upvoted.insert(id);
                comment.up_votes += 1;
            }
            VoteDirection::Down => {
                self.downvoted.insert(id);
                comment.down_votes += 1;
            }
        }
        VoteChange::Cast(requested)
    }

    /// Drops the entry for a comment without touching its counters.
    pub(crate) fn revert_vote(&mut self, id: CommentId) -> Option<VoteDirection> {
        if self.upvoted.remove(&id) {
            Some(VoteDirection::Up)
        } else if self.downvoted.remove(&id) {
            Some(VoteDirection::Down)
        } else {
            None
        }
    }

    pub(crate) fn vote_of(&self, id: CommentId) -> Option<VoteDirection> {
        if self.upvoted.contains(&id) {
            Some(VoteDirection::Up)
        } else if self.downvoted.contains(&id) {
            Some(VoteDirection::Down)
        } else {
            None
        }
    }

    pub(crate) fn rekey(&mut self, old: CommentId, new: CommentId) {
        if old == new {
            return;
        }
        match self.revert_vote(old) {
            Some(VoteDirection::Up) => {
                self.upvoted.insert(new);
            }
            Some(VoteDirection::Down) => {
                self.downvoted.insert(new);
            }
            None => {}
        }
    }

    /// Forgets votes on comments the tree does not hold.
    pub(crate) fn retain_known(&mut self, tree: &CommentTree) -> usize {
        let before = self.len();
        self.upvoted.retain(|id| tree.contains(*id));
        self.downvoted.retain(|id| tree.contains(*id));
        before - self.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.upvoted.len() + self.downvoted.len()
    }
}
