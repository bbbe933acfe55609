//! Signed commit construction.
//!
//! Every rewritten commit goes through [`CommitSigner::sign`]. A failure to
//! sign is never downgraded to an unsigned commit: the error is returned and
//! the rewrite stops.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::RewriteError;
use crate::git::{self, CommitTree, Signing};
use crate::rewrite::CommitDraft;

/// Where the signing key came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    CommandLine,
    GitConfig,
}

/// A resolved signing key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKey {
    pub id: String,
    pub source: KeySource,
}

/// Picks the signing key: `explicit` first, then `configured`.
///
/// Having neither is an error, not a fallback to git's default identity key.
pub fn choose_key(explicit: Option<&str>, configured: Option<&str>) -> Result<SigningKey, RewriteError> {
    let pick = |v: Option<&str>| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

    if let Some(id) = pick(explicit) {
        return Ok(SigningKey {
            id,
            source: KeySource::CommandLine,
        });
    }
    if let Some(id) = pick(configured) {
        return Ok(SigningKey {
            id,
            source: KeySource::GitConfig,
        });
    }
    Err(RewriteError::MissingSigningKey)
}

/// Name of the program git will run to sign, given `gpg.format` and the
/// matching `gpg.*.program` setting.
pub fn signing_program(format: Option<&str>, program: Option<&str>) -> String {
    if let Some(p) = program.filter(|p| !p.trim().is_empty()) {
        return p.trim().to_string();
    }
    match format.unwrap_or("openpgp") {
        "ssh" => String::from("ssh-keygen"),
        "x509" => String::from("gpgsm"),
        _ => String::from("gpg"),
    }
}

/// Config key holding the program for `format`.
fn program_key(format: Option<&str>) -> &'static str {
    match format.unwrap_or("openpgp") {
        "ssh" => "gpg.ssh.program",
        "x509" => "gpg.x509.program",
        _ => "gpg.program",
    }
}

/// Resolves the key and checks the signing program is installed.
///
/// Runs before any object is written so that a missing key fails the whole
/// operation up front.
pub fn preflight(root: &Path, explicit_key: Option<&str>) -> Result<SigningKey, RewriteError> {
    let configured = git::config_get(root, "user.signingkey");
    let key = choose_key(explicit_key, configured.as_deref())?;

    let format = git::config_get(root, "gpg.format");
    let program_setting = git::config_get(root, program_key(format.as_deref()));
    let program = signing_program(format.as_deref(), program_setting.as_deref());

    if which::which(&program).is_err() {
        return Err(RewriteError::SigningProgramNotFound(program));
    }

    info!(key = %key.id, source = ?key.source, program = %program, "signing preflight passed");
    Ok(key)
}

/// Writes signed replacement commits into a repository.
pub struct CommitSigner {
    root: PathBuf,
    key: SigningKey,
}

impl CommitSigner {
    pub fn new(root: impl Into<PathBuf>, key: SigningKey) -> Self {
        Self {
            root: root.into(),
            key,
        }
    }

    /// Writes `draft` as a new commit signed with the configured key.
    ///
    /// Any failure is reported against the original commit id.
    pub fn sign(&self, draft: &CommitDraft) -> Result<String, RewriteError> {
        let input = CommitTree {
            tree: &draft.tree,
            parents: &draft.parents,
            author: &draft.identity.author,
            committer: &draft.identity.committer,
            encoding: draft.encoding.as_deref(),
            message: &draft.message,
        };

        match git::commit_tree(&self.root, &input, &Signing::Key(self.key.id.clone())) {
            Ok(oid) if !oid.is_empty() => {
                debug!(original = %draft.original, new = %oid, "signed commit");
                Ok(oid)
            }
            Ok(_) => Err(RewriteError::Signing {
                commit: draft.original.clone(),
                detail: String::from("`git commit-tree` returned no object id"),
            }),
            Err(RewriteError::GitCommand { stderr, .. }) => Err(RewriteError::Signing {
                commit: draft.original.clone(),
                detail: stderr,
            }),
            Err(e) => Err(RewriteError::Signing {
                commit: draft.original.clone(),
                detail: e.to_string(),
            }),
        }
    }
}
