//! History traversal: visits every commit reachable from all branches and
//! tags, parents first, and swaps the rewritten refs into place at the end.
//!
//! The traversal does not know how identities are chosen or how commits are
//! written. Both are passed in as functions, so the same walk drives the
//! signed rewrite in production and unsigned or in-memory rewrites in tests.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::error::RewriteError;
use crate::identity::{CommitIdentity, RewriteRule};
use crate::object::{Commit, Tag};

/// Namespace where the previous value of every rewritten ref is kept.
pub const BACKUP_NAMESPACE: &str = "refs/original/";

/// Ref namespaces covered by a rewrite.
pub const SCOPE: [&str; 2] = ["refs/heads/", "refs/tags/"];

/// What a ref points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    Commit,
    /// An annotated tag whose object is the given commit.
    AnnotatedTag { commit: String },
    /// A tree, blob, or a tag that does not point directly at a commit.
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    pub name: String,
    pub oid: String,
    pub target: RefTarget,
}

impl RefEntry {
    /// The commit this ref reaches, if any.
    pub fn commit(&self) -> Option<&str> {
        match &self.target {
            RefTarget::Commit => Some(&self.oid),
            RefTarget::AnnotatedTag { commit } => Some(commit),
            RefTarget::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub name: String,
    pub old: String,
    pub new: String,
}

/// Everything needed to write the replacement for one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDraft {
    /// Id of the commit being replaced.
    pub original: String,
    pub tree: String,
    /// Parent ids, already mapped to their rewritten counterparts.
    pub parents: Vec<String>,
    pub identity: CommitIdentity,
    pub encoding: Option<String>,
    pub message: Vec<u8>,
}

/// Access to the repository being rewritten.
pub trait History {
    /// Branches and tags in scope.
    fn refs(&self) -> Result<Vec<RefEntry>, RewriteError>;

    /// Returns `true` if any ref exists under [`BACKUP_NAMESPACE`].
    fn has_backups(&self) -> Result<bool, RewriteError>;

    /// Every commit reachable from `tips`, each once, parents before children.
    fn topo_order(&self, tips: &[String]) -> Result<Vec<String>, RewriteError>;

    fn read_commit(&self, oid: &str) -> Result<Commit, RewriteError>;

    fn read_tag(&self, oid: &str) -> Result<Tag, RewriteError>;

    /// Stores a tag object and returns its id.
    fn write_tag(&mut self, tag: &Tag) -> Result<String, RewriteError>;

    /// Moves every ref in `updates` and records each old value under
    /// [`BACKUP_NAMESPACE`], all or nothing.
    fn swap_refs(&mut self, updates: &[RefUpdate]) -> Result<(), RewriteError>;
}

/// Outcome of a completed rewrite.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    /// Old and new commit ids, in processing order.
    pub rewritten: Vec<(String, String)>,
    /// Number of commits whose author or committer changed.
    pub identities_changed: usize,
    pub ref_updates: Vec<RefUpdate>,
}

impl RewriteReport {
    pub fn new_commit(&self, old: &str) -> Option<&str> {
        self.rewritten
            .iter()
            .find(|(o, _)| o == old)
            .map(|(_, n)| n.as_str())
    }
}

/// Options for [`rewrite_history`].
#[derive(Debug, Clone, Default)]
pub struct RewriteOptions {
    /// Proceed even if backups from an earlier rewrite exist.
    pub force: bool,
    /// Rule applied to the tagger of rewritten annotated tags.
    pub tagger_rule: Option<RewriteRule>,
}

/// Fails with [`RewriteError::AlreadyRewritten`] if backups exist and
/// `force` is not set.
pub fn check_not_rewritten<H: History + ?Sized>(history: &H, force: bool) -> Result<(), RewriteError> {
    if history.has_backups()? {
        if force {
            warn!(namespace = BACKUP_NAMESPACE, "overwriting existing backup refs");
        } else {
            return Err(RewriteError::AlreadyRewritten {
                namespace: BACKUP_NAMESPACE.to_string(),
            });
        }
    }
    Ok(())
}

/// Rewrites every commit reachable from the branches and tags of `history`.
///
/// For each commit, parents first, `decide` picks the new identity and
/// `construct` writes the replacement commit and returns its id. Every
/// commit is rebuilt, whether or not its identity changed, because its
/// parents or its signature change.
///
/// Refs are only touched after all commits have been written. If
/// `construct` fails the walk stops and the error is returned with no ref
/// modified.
pub fn rewrite_history<H, D, C>(
    history: &mut H,
    options: &RewriteOptions,
    decide: D,
    mut construct: C,
) -> Result<RewriteReport, RewriteError>
where
    H: History + ?Sized,
    D: Fn(&CommitIdentity) -> CommitIdentity,
    C: FnMut(&CommitDraft) -> Result<String, RewriteError>,
{
    check_not_rewritten(&*history, options.force)?;

    let refs = history.refs()?;
    let mut tips: Vec<String> = Vec::new();
    for r in &refs {
        if let Some(c) = r.commit() {
            if !tips.iter().any(|t| t == c) {
                tips.push(c.to_string());
            }
        }
    }

    let order = history.topo_order(&tips)?;
    info!(commits = order.len(), refs = refs.len(), "rewriting history");

    let mut map: HashMap<String, String> = HashMap::with_capacity(order.len());
    let mut report = RewriteReport::default();

    for oid in &order {
        let commit = history.read_commit(oid)?;
        let before = commit.identity();
        let identity = decide(&before);
        if identity != before {
            report.identities_changed += 1;
        }

        let parents = commit
            .parents
            .iter()
            .map(|p| map.get(p).cloned().unwrap_or_else(|| p.clone()))
            .collect();

        let draft = CommitDraft {
            original: commit.oid.clone(),
            tree: commit.tree,
            parents,
            identity,
            encoding: commit.encoding,
            message: commit.message,
        };

        let new = construct(&draft)?;
        debug!(old = %oid, new = %new, "rewrote commit");
        map.insert(oid.clone(), new.clone());
        report.rewritten.push((oid.clone(), new));
    }

    let mut updates = Vec::new();
    for r in &refs {
        let new = match &r.target {
            RefTarget::Commit => match map.get(&r.oid) {
                Some(n) => n.clone(),
                None => continue,
            },
            RefTarget::AnnotatedTag { commit } => match map.get(commit) {
                Some(n) => retag(history, r, n, options.tagger_rule.as_ref())?,
                None => continue,
            },
            RefTarget::Other => {
                debug!(refname = %r.name, "ref does not point at a commit, left alone");
                continue;
            }
        };
        if new != r.oid {
            updates.push(RefUpdate {
                name: r.name.clone(),
                old: r.oid.clone(),
                new,
            });
        }
    }

    history.swap_refs(&updates)?;
    info!(
        commits = report.rewritten.len(),
        changed = report.identities_changed,
        refs = updates.len(),
        "history rewritten"
    );
    report.ref_updates = updates;
    Ok(report)
}

/// Writes a copy of an annotated tag pointing at `new_commit`.
fn retag<H: History + ?Sized>(
    history: &mut H,
    entry: &RefEntry,
    new_commit: &str,
    rule: Option<&RewriteRule>,
) -> Result<String, RewriteError> {
    let mut tag = history.read_tag(&entry.oid)?;
    if tag.signed {
        warn!(refname = %entry.name, "dropping signature from rewritten tag");
    }
    tag.object = new_commit.to_string();
    tag.signed = false;
    if let (Some(rule), Some(tagger)) = (rule, tag.tagger.as_ref()) {
        tag.tagger = Some(rule.apply_signature(tagger));
    }
    history.write_tag(&tag)
}

/// Commits reachable from all branches and tags that still use `email` as
/// author or committer.
pub fn commits_with_email<H: History + ?Sized>(history: &H, email: &str) -> Result<Vec<String>, RewriteError> {
    let mut tips: Vec<String> = Vec::new();
    for r in history.refs()? {
        if let Some(c) = r.commit() {
            tips.push(c.to_string());
        }
    }
    let mut hits = Vec::new();
    for oid in history.topo_order(&tips)? {
        let c = history.read_commit(&oid)?;
        if c.author.has_email(email) || c.committer.has_email(email) {
            hits.push(oid);
        }
    }
    Ok(hits)
}
