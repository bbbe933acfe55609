//! Error type shared by every stage of the rewrite.

use thiserror::Error;

/// Errors raised while inspecting, rewriting, or auditing a repository.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// The `git` binary was not found on `$PATH`.
    #[error("`git` not found in PATH")]
    GitNotFound,

    /// The working directory is not inside a git repository.
    #[error("not inside a git repo ({0})")]
    NotARepository(String),

    /// A `git` invocation exited with a non-zero status.
    #[error("`git {command}` failed: {stderr}")]
    GitCommand { command: String, stderr: String },

    /// The run configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Spawning or talking to a child process failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An object read from the store could not be parsed.
    #[error("malformed object {oid}: {detail}")]
    MalformedObject { oid: String, detail: String },

    /// A previous rewrite left backup refs behind.
    #[error(
        "backup refs already exist under {namespace} (a previous rewrite?); \
         re-run with --force to overwrite them"
    )]
    AlreadyRewritten { namespace: String },

    /// No signing key was given and none is configured.
    #[error("no signing key: pass --signing-key or set `git config user.signingkey`")]
    MissingSigningKey,

    /// The configured signing program is not installed.
    #[error("signing program `{0}` not found in PATH")]
    SigningProgramNotFound(String),

    /// Writing the signed replacement for a commit failed.
    #[error("failed to sign rewritten commit for {commit}: {detail}")]
    Signing { commit: String, detail: String },

    /// The sentinel email is still reachable after the rewrite.
    #[error("{count} reachable commit(s) still use {email}, first: {first}")]
    SentinelRemaining {
        email: String,
        count: usize,
        first: String,
    },

    /// `git verify-commit` rejected a rewritten commit.
    #[error("signature on {commit} does not verify: {detail}")]
    SignatureInvalid { commit: String, detail: String },

    /// The interactive prompt could not be shown.
    #[error("prompt error: {0}")]
    Prompt(String),
}
