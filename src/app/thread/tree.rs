use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::warn;
use rand::Rng;

use super::super::episode::EpisodeId;
use super::super::error::ValidationError;
use super::super::remote::CommentRecord;
use super::super::timepoint::Timepoint;
use super::{
    Author, Comment, CommentId, DELETED_AUTHOR_ID, DELETED_AUTHOR_NAME, DELETED_CONTENT, SyncState,
};

/// Placeholder ids live far above anything a server sequence will reach.
const PLACEHOLDER_ID_MIN: u64 = 1 << 48;

/// Stable slot of a comment in the arena. Survives id reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeKey(usize);

/// Arena of comments. Nodes are never removed, so keys and reply order stay stable.
#[derive(Debug, Clone, Default)]
pub(crate) struct CommentTree {
    nodes: Vec<Comment>,
    index: HashMap<CommentId, NodeKey>,
    roots: Vec<NodeKey>,
}

impl CommentTree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Builds the tree from the server's flat comment list.
    ///
    /// Records may arrive in any order. Invalid and duplicate records are
    /// skipped; replies whose parent is missing become roots.
    pub(crate) fn from_records(records: &[CommentRecord]) -> Self {
        let mut tree = Self::new();
        let mut links = Vec::with_capacity(records.len());
        for record in records {
            if tree.index.contains_key(&record.id) {
                warn!("skipping duplicate comment record {}", record.id);
                continue;
            }
            match Comment::from_record(record) {
                Ok(comment) => {
                    let key = tree.push(comment);
                    links.push((key, record.parent_id));
                }
                Err(err) => warn!("skipping comment record: {err}"),
            }
        }

        for (key, parent_id) in links {
            let Some(parent_id) = parent_id else {
                tree.roots.push(key);
                continue;
            };
            match tree.index.get(&parent_id).copied() {
                Some(parent) if !tree.is_ancestor_or_self(key, parent) => {
                    tree.attach_reply(parent, key);
                }
                Some(_) => {
                    warn!(
                        "comment {} would form a reply cycle; treating it as a thread root",
                        tree.nodes[key.0].id
                    );
                    tree.roots.push(key);
                }
                None => {
                    warn!(
                        "comment {} replies to unknown comment {parent_id}; treating it as a thread root",
                        tree.nodes[key.0].id
                    );
                    tree.roots.push(key);
                }
            }
        }
        tree
    }

    /// Adds a comment authored locally under a fresh placeholder id.
    pub(crate) fn create_local(
        &mut self,
        episode_id: EpisodeId,
        author: Author,
        content: &str,
        timepoint: Timepoint,
        parent: Option<CommentId>,
        now: DateTime<Utc>,
    ) -> Result<CommentId, ValidationError> {
        let parent_key = parent
            .map(|id| self.key_of(id).ok_or(ValidationError::UnknownComment(id)))
            .transpose()?;

        let id = self.fresh_placeholder_id();
        let key = self.push(Comment {
            id,
            episode_id,
            author,
            content: content.to_string(),
            created_at: now,
            modified_at: now,
            timepoint,
            up_votes: 0,
            down_votes: 0,
            sync: SyncState::Pending,
            parent: None,
            replies: Vec::new(),
        });
        match parent_key {
            Some(parent_key) => self.attach_reply(parent_key, key),
            None => self.roots.push(key),
        }
        Ok(id)
    }

    pub(crate) fn attach_reply(&mut self, parent: NodeKey, child: NodeKey) {
        self.nodes[parent.0].replies.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Swaps a placeholder id for the server's. Calling it again with the same id is a no-op.
    pub(crate) fn reconcile_server_id(&mut self, key: NodeKey, server_id: CommentId) -> bool {
        let Some(node) = self.nodes.get_mut(key.0) else {
            return false;
        };
        if node.id == server_id {
            node.sync = SyncState::Confirmed;
            return true;
        }
        if self.index.contains_key(&server_id) {
            warn!(
                "server id {server_id} already belongs to another comment; keeping {}",
                node.id
            );
            return false;
        }
        self.index.remove(&node.id);
        node.id = server_id;
        node.sync = SyncState::Confirmed;
        self.index.insert(server_id, key);
        true
    }

    pub(crate) fn soft_delete(&mut self, id: CommentId) -> bool {
        let Some(comment) = self.get_mut(id) else {
            return false;
        };
        comment.author = Author {
            id: DELETED_AUTHOR_ID.to_string(),
            name: DELETED_AUTHOR_NAME.to_string(),
        };
        comment.content = DELETED_CONTENT.to_string();
        true
    }

    pub(crate) fn edit_content(&mut self, id: CommentId, content: &str, now: DateTime<Utc>) -> bool {
        let Some(comment) = self.get_mut(id) else {
            return false;
        };
        comment.content = content.to_string();
        comment.modified_at = now;
        true
    }

    pub(crate) fn key_of(&self, id: CommentId) -> Option<NodeKey> {
        self.index.get(&id).copied()
    }

    pub(crate) fn contains(&self, id: CommentId) -> bool {
        self.index.contains_key(&id)
    }

    pub(crate) fn get(&self, id: CommentId) -> Option<&Comment> {
        self.key_of(id).and_then(|key| self.node(key))
    }

    pub(crate) fn get_mut(&mut self, id: CommentId) -> Option<&mut Comment> {
        let key = self.key_of(id)?;
        self.node_mut(key)
    }

    pub(crate) fn node(&self, key: NodeKey) -> Option<&Comment> {
        self.nodes.get(key.0)
    }

    pub(crate) fn node_mut(&mut self, key: NodeKey) -> Option<&mut Comment> {
        self.nodes.get_mut(key.0)
    }

    pub(crate) fn parent_of(&self, id: CommentId) -> Option<&Comment> {
        self.get(id)?.parent.and_then(|key| self.node(key))
    }

    pub(crate) fn replies_of(&self, id: CommentId) -> impl Iterator<Item = &Comment> + '_ {
        self.get(id)
            .map(|comment| comment.replies.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|key| &self.nodes[key.0])
    }

    pub(crate) fn roots(&self) -> impl Iterator<Item = &Comment> + '_ {
        self.roots.iter().map(|key| &self.nodes[key.0])
    }

    /// Roots sit at depth 0.
    pub(crate) fn depth(&self, id: CommentId) -> Option<usize> {
        let mut current = self.key_of(id)?;
        let mut depth = 0;
        while let Some(parent) = self.nodes[current.0].parent {
            depth += 1;
            current = parent;
        }
        Some(depth)
    }

    /// Pre-order walk over every comment. Each call starts a fresh traversal.
    pub(crate) fn iter(&self) -> Iter<'_> {
        Iter {
            tree: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, comment: Comment) -> NodeKey {
        let key = NodeKey(self.nodes.len());
        self.index.insert(comment.id, key);
        self.nodes.push(comment);
        key
    }

    fn fresh_placeholder_id(&self) -> CommentId {
        let mut rng = rand::thread_rng();
        loop {
            let candidate = CommentId(rng.gen_range(PLACEHOLDER_ID_MIN..u64::MAX));
            if !self.index.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    fn is_ancestor_or_self(&self, candidate: NodeKey, mut key: NodeKey) -> bool {
        loop {
            if key == candidate {
                return true;
            }
            match self.nodes[key.0].parent {
                Some(parent) => key = parent,
                None => return false,
            }
        }
    }
}

impl<'a> IntoIterator for &'a CommentTree {
    type Item = &'a Comment;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub(crate) struct Iter<'a> {
    tree: &'a CommentTree,
    stack: Vec<NodeKey>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Comment;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.stack.pop()?;
        let comment = &self.tree.nodes[key.0];
        self.stack.extend(comment.replies.iter().rev().copied());
        Some(comment)
    }
}
