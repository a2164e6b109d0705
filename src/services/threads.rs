// Comment thread reconstruction. The source system leaned on a recursive
// CTE; here the tree is rebuilt with an explicit stack, a visited set, and
// a depth bound so termination never depends on data being well-formed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::GraphConfig;
use crate::error::{AppError, AppResult};
use crate::models::{AncestorNode, Comment, Id, ThreadNode};
use crate::store::SocialStore;

#[derive(Clone)]
pub struct ThreadService {
    store: Arc<dyn SocialStore>,
    config: GraphConfig,
}

impl ThreadService {
    pub fn new(store: Arc<dyn SocialStore>, config: GraphConfig) -> Self {
        Self { store, config }
    }

    /// The post's comment tree in depth-first pre-order. Roots sit at
    /// depth 0; siblings are numbered in creation order, giving each node
    /// a dot-delimited position ("1.2.3") that sorts the way the thread
    /// renders. Descendants past the depth bound are dropped, as is
    /// anything unreachable from a root (orphans, cycles).
    pub async fn thread(&self, post_id: Id) -> AppResult<Vec<ThreadNode>> {
        if self.store.get_post(post_id).await?.is_none() {
            return Err(AppError::NotFound(format!("post {}", post_id)));
        }

        // comments_for_post is creation-ordered, so the children lists
        // inherit sibling order.
        let comments = self.store.comments_for_post(post_id).await?;
        let by_id: HashMap<Id, &Comment> = comments.iter().map(|c| (c.id, c)).collect();
        let mut children: HashMap<Option<Id>, Vec<&Comment>> = HashMap::new();
        for comment in &comments {
            match comment.parent_id {
                // A parent outside the post's comment set makes the node
                // an orphan; it never enters the tree.
                Some(pid) if !by_id.contains_key(&pid) => continue,
                key => children.entry(key).or_default().push(comment),
            }
        }

        let mut out = Vec::with_capacity(comments.len());
        let mut visited: HashSet<Id> = HashSet::new();

        // Explicit stack; children pushed in reverse so pre-order pops in
        // creation order.
        struct Frame<'a> {
            comment: &'a Comment,
            depth: u32,
            path: Vec<Id>,
            position: String,
        }

        let mut stack: Vec<Frame<'_>> = Vec::new();
        if let Some(roots) = children.get(&None) {
            for (i, root) in roots.iter().enumerate().rev() {
                stack.push(Frame {
                    comment: *root,
                    depth: 0,
                    path: vec![root.id],
                    position: format!("{}", i + 1),
                });
            }
        }

        while let Some(frame) = stack.pop() {
            if !visited.insert(frame.comment.id) {
                continue;
            }
            if let Some(kids) = children.get(&Some(frame.comment.id)) {
                // Dropping descendants past the bound protects against
                // malformed or adversarial nesting.
                if frame.depth < self.config.max_thread_depth {
                    for (i, kid) in kids.iter().enumerate().rev() {
                        let mut path = frame.path.clone();
                        path.push(kid.id);
                        stack.push(Frame {
                            comment: *kid,
                            depth: frame.depth + 1,
                            path,
                            position: format!("{}.{}", frame.position, i + 1),
                        });
                    }
                }
            }
            out.push(ThreadNode {
                comment_id: frame.comment.id,
                parent_id: frame.comment.parent_id,
                depth: frame.depth,
                path: frame.path,
                position: frame.position,
                content: frame.comment.content.clone(),
                author_id: frame.comment.author_id,
                created_at: frame.comment.created_at,
            });
        }

        Ok(out)
    }

    /// Parent chain from the root down to `comment_id` inclusive. No
    /// depth bound (threads are shallow by construction), but a visited
    /// set turns cyclic parent data into an error instead of a hang.
    pub async fn ancestors(&self, comment_id: Id) -> AppResult<Vec<AncestorNode>> {
        let target = self
            .store
            .get_comment(comment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("comment {}", comment_id)))?;

        let mut chain: Vec<Comment> = vec![target];
        let mut visited: HashSet<Id> = HashSet::from([comment_id]);

        loop {
            let Some(parent_id) = chain.last().and_then(|c| c.parent_id) else {
                break;
            };
            if !visited.insert(parent_id) {
                return Err(AppError::ConstraintViolation(format!(
                    "comment {} is part of a parent cycle",
                    comment_id
                )));
            }
            match self.store.get_comment(parent_id).await? {
                Some(parent) => chain.push(parent),
                // Dangling parent pointer; treat the last reachable node
                // as the root.
                None => break,
            }
        }

        chain.reverse();
        Ok(chain
            .into_iter()
            .enumerate()
            .map(|(depth, c)| AncestorNode {
                comment_id: c.id,
                parent_id: c.parent_id,
                depth: depth as u32,
                content: c.content,
            })
            .collect())
    }
}
