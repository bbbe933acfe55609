//! Checks on the rewritten history: the sentinel audit after the swap, and
//! signature verification of new commits before it.

use tracing::{debug, info, warn};

use crate::error::RewriteError;
use crate::rewrite::{History, commits_with_email};

/// Fails if any commit reachable from a branch or tag still uses `email`.
pub fn ensure_sentinel_gone<H: History + ?Sized>(history: &H, email: &str) -> Result<(), RewriteError> {
    let hits = commits_with_email(history, email)?;
    match hits.first() {
        None => {
            info!(email, "no reachable commit uses the sentinel email");
            Ok(())
        }
        Some(first) => {
            warn!(email, count = hits.len(), "sentinel email still reachable");
            Err(RewriteError::SentinelRemaining {
                email: email.to_string(),
                count: hits.len(),
                first: first.clone(),
            })
        }
    }
}

/// Runs `verify` on each new commit id and stops at the first failure.
///
/// Called on each commit as it is written, before any ref moves. Returns
/// the number of commits checked.
pub fn verify_signatures<'a, I, F>(commits: I, mut verify: F) -> Result<usize, RewriteError>
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut(&str) -> Result<(), RewriteError>,
{
    let mut checked = 0;
    for oid in commits {
        verify(oid).map_err(|e| RewriteError::SignatureInvalid {
            commit: oid.to_string(),
            detail: match e {
                RewriteError::GitCommand { stderr, .. } => stderr,
                other => other.to_string(),
            },
        })?;
        checked += 1;
    }
    debug!(checked, "signatures verified");
    Ok(checked)
}
