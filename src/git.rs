use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::RewriteError;
use crate::identity::Signature;

/// How `git commit-tree` should sign the commit it writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signing {
    /// Pass `--no-gpg-sign`, overriding `commit.gpgSign`.
    Disabled,
    /// Pass `-S<key>`.
    Key(String),
}

impl Signing {
    fn arg(&self) -> String {
        match self {
            Signing::Disabled => String::from("--no-gpg-sign"),
            Signing::Key(k) => format!("-S{}", k),
        }
    }
}

/// Inputs for a single `git commit-tree` call.
#[derive(Debug, Clone)]
pub struct CommitTree<'a> {
    pub tree: &'a str,
    pub parents: &'a [String],
    pub author: &'a Signature,
    pub committer: &'a Signature,
    pub encoding: Option<&'a str>,
    pub message: &'a [u8],
}

/// Builds a `git` command rooted at `dir`.
///
/// Output is piped so that failures can be reported with git's own stderr.
fn git(dir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(dir);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd
}

/// Environment value carrying raw identity bytes.
#[cfg(unix)]
fn env_value(bytes: &[u8]) -> OsString {
    use std::os::unix::ffi::OsStrExt;
    std::ffi::OsStr::from_bytes(bytes).to_os_string()
}

#[cfg(not(unix))]
fn env_value(bytes: &[u8]) -> OsString {
    OsString::from(String::from_utf8_lossy(bytes).into_owned())
}

fn describe(cmd: &Command) -> String {
    cmd.get_args()
        .map(|a| a.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs a command, writing `input` to its stdin, and returns raw stdout.
///
/// A non-zero exit becomes [`RewriteError::GitCommand`] carrying the trimmed
/// stderr.
fn run_raw(mut cmd: Command, input: Option<&[u8]>) -> Result<Vec<u8>, RewriteError> {
    let command = describe(&cmd);
    debug!(command = %command, "running git");

    if input.is_some() {
        cmd.stdin(Stdio::piped());
    }
    let mut child = cmd.spawn()?;

    if let Some(bytes) = input {
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(bytes)?;
        }
    }

    let out = child.wait_with_output()?;
    if out.status.success() {
        Ok(out.stdout)
    } else {
        Err(RewriteError::GitCommand {
            command,
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        })
    }
}

/// Runs a command and returns its trimmed stdout as text.
fn run_output(cmd: Command) -> Result<String, RewriteError> {
    let out = run_raw(cmd, None)?;
    Ok(String::from_utf8_lossy(&out).trim().to_string())
}

/// Runs `git rev-parse <flag>` in `dir`.
///
/// Typically used with `--show-toplevel` or `--git-dir` to locate the
/// repository.
///
/// # Parameters
///
/// * `dir` – Directory to run git in.
/// * `flag` – The single `rev-parse` argument.
///
/// # Returns
///
/// * `Ok(String)` with the trimmed output.
/// * `Err(RewriteError::GitCommand)` if git exits non-zero (e.g. `dir` is
///   not inside a repository).
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use git_identity_rewrite::git::rev_parse;
///
/// let root = rev_parse(Path::new("."), "--show-toplevel")?;
/// println!("repository root: {}", root);
/// # Ok::<(), git_identity_rewrite::error::RewriteError>(())
/// ```
pub fn rev_parse(dir: &Path, flag: &str) -> Result<String, RewriteError> {
    let mut cmd = git(dir);
    cmd.arg("rev-parse").arg(flag);
    run_output(cmd)
}

/// Runs `git config --get <key>`.
///
/// # Parameters
///
/// * `dir` – Directory whose repository config (plus global and system
///   config) is consulted.
/// * `key` – Config key, e.g. `user.signingkey`.
///
/// # Returns
///
/// * `Some(String)` with the trimmed value.
/// * `None` if the key is unset, empty, or git fails. A missing key is not
///   an error.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use git_identity_rewrite::git::config_get;
///
/// match config_get(Path::new("."), "user.signingkey") {
///     Some(key) => println!("signing with {}", key),
///     None => eprintln!("no signing key configured"),
/// }
/// ```
pub fn config_get(dir: &Path, key: &str) -> Option<String> {
    let mut cmd = git(dir);
    cmd.arg("config").arg("--get").arg(key);
    match run_output(cmd) {
        Ok(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

/// Lists refs matching `patterns` using a `for-each-ref` format string.
///
/// # Parameters
///
/// * `dir` – Repository directory.
/// * `format` – A `--format` string; fields are usually separated with `%09`.
/// * `patterns` – Ref prefixes such as `refs/heads/`. Empty means all refs.
///
/// # Returns
///
/// * `Ok(Vec<String>)` with one formatted line per ref.
/// * `Err(RewriteError::GitCommand)` if git fails.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use git_identity_rewrite::git::for_each_ref;
///
/// for line in for_each_ref(Path::new("."), "%(refname)", &["refs/heads/"])? {
///     println!("{}", line);
/// }
/// # Ok::<(), git_identity_rewrite::error::RewriteError>(())
/// ```
pub fn for_each_ref(dir: &Path, format: &str, patterns: &[&str]) -> Result<Vec<String>, RewriteError> {
    let mut cmd = git(dir);
    cmd.arg("for-each-ref").arg(format!("--format={}", format));
    cmd.args(patterns);
    let out = run_output(cmd)?;
    Ok(out.lines().map(str::to_string).collect())
}

/// Lists every commit reachable from `tips`, parents before children.
///
/// Runs `git rev-list --topo-order --reverse --stdin` so an arbitrary number
/// of tips can be passed without hitting argument-length limits.
///
/// # Parameters
///
/// * `dir` – Repository directory.
/// * `tips` – Commit ids to start from. Duplicates are fine.
///
/// # Returns
///
/// * `Ok(Vec<String>)` with each reachable commit once, every parent listed
///   before its children. An empty `tips` yields an empty list without
///   running git.
/// * `Err(RewriteError::GitCommand)` if a tip is unknown.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use git_identity_rewrite::git::rev_list_topo;
///
/// let order = rev_list_topo(Path::new("."), &["HEAD".to_string()])?;
/// println!("{} commits, root first", order.len());
/// # Ok::<(), git_identity_rewrite::error::RewriteError>(())
/// ```
pub fn rev_list_topo(dir: &Path, tips: &[String]) -> Result<Vec<String>, RewriteError> {
    if tips.is_empty() {
        return Ok(Vec::new());
    }
    let mut cmd = git(dir);
    cmd.arg("rev-list")
        .arg("--topo-order")
        .arg("--reverse")
        .arg("--stdin");
    let input = tips.join("\n") + "\n";
    let out = run_raw(cmd, Some(input.as_bytes()))?;
    Ok(String::from_utf8_lossy(&out)
        .lines()
        .map(str::to_string)
        .collect())
}

/// Reads the raw body of an object with `git cat-file <kind> <oid>`.
///
/// # Parameters
///
/// * `dir` – Repository directory.
/// * `kind` – Expected object type (`commit`, `tag`, ...).
/// * `oid` – Object id.
///
/// # Returns
///
/// * `Ok(Vec<u8>)` with the object body, byte for byte.
/// * `Err(RewriteError::GitCommand)` if the object is missing or of another
///   type.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use git_identity_rewrite::git::cat_file;
///
/// let raw = cat_file(Path::new("."), "commit", "HEAD")?;
/// println!("{} bytes", raw.len());
/// # Ok::<(), git_identity_rewrite::error::RewriteError>(())
/// ```
pub fn cat_file(dir: &Path, kind: &str, oid: &str) -> Result<Vec<u8>, RewriteError> {
    let mut cmd = git(dir);
    cmd.arg("cat-file").arg(kind).arg(oid);
    run_raw(cmd, None)
}

/// Writes a raw object of type `kind` into the object store.
///
/// # Parameters
///
/// * `dir` – Repository directory.
/// * `kind` – Object type passed to `-t` (`tag`, `tree`, ...).
/// * `body` – Canonical object body.
///
/// # Returns
///
/// * `Ok(String)` with the id of the stored object.
/// * `Err(RewriteError::GitCommand)` if git rejects the body.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use git_identity_rewrite::git::hash_object;
///
/// let empty_tree = hash_object(Path::new("."), "tree", b"")?;
/// assert_eq!(empty_tree, "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
/// # Ok::<(), git_identity_rewrite::error::RewriteError>(())
/// ```
pub fn hash_object(dir: &Path, kind: &str, body: &[u8]) -> Result<String, RewriteError> {
    let mut cmd = git(dir);
    cmd.arg("hash-object")
        .arg("-t")
        .arg(kind)
        .arg("-w")
        .arg("--stdin");
    let out = run_raw(cmd, Some(body))?;
    Ok(String::from_utf8_lossy(&out).trim().to_string())
}

/// Writes a new commit with `git commit-tree` and returns its id.
///
/// Identity and dates are handed to git through `GIT_AUTHOR_*` and
/// `GIT_COMMITTER_*` on the child process only; the caller's environment is
/// not modified. Names and emails are passed as raw bytes, so identities
/// that are not UTF-8 are written back unchanged. The message is piped
/// verbatim on stdin, and `encoding` becomes the commit's `encoding` header.
///
/// # Parameters
///
/// * `dir` – Repository directory.
/// * `input` – Tree, parents, author, committer, encoding and message.
/// * `signing` – Whether and with which key git signs the commit.
///
/// # Returns
///
/// * `Ok(String)` with the new commit id.
/// * `Err(RewriteError::GitCommand)` if git or the signing program fails.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use git_identity_rewrite::git::{commit_tree, CommitTree, Signing};
/// use git_identity_rewrite::identity::Signature;
///
/// let me = Signature::parse(b"Jane Doe <jane@example.com> 1700000000 +0000").unwrap();
/// let oid = commit_tree(
///     Path::new("."),
///     &CommitTree {
///         tree: "4b825dc642cb6eb9a060e54bf8d69288fbee4904",
///         parents: &[],
///         author: &me,
///         committer: &me,
///         encoding: None,
///         message: b"Initial commit\n",
///     },
///     &Signing::Key("ABCD1234".into()),
/// )?;
/// println!("wrote {}", oid);
/// # Ok::<(), git_identity_rewrite::error::RewriteError>(())
/// ```
pub fn commit_tree(dir: &Path, input: &CommitTree<'_>, signing: &Signing) -> Result<String, RewriteError> {
    let mut cmd = git(dir);
    if let Some(enc) = input.encoding {
        cmd.arg("-c").arg(format!("i18n.commitEncoding={}", enc));
    }
    cmd.arg("commit-tree").arg(signing.arg());
    for parent in input.parents {
        cmd.arg("-p").arg(parent);
    }
    cmd.arg(input.tree);

    cmd.env("GIT_AUTHOR_NAME", env_value(&input.author.name))
        .env("GIT_AUTHOR_EMAIL", env_value(&input.author.email))
        .env("GIT_AUTHOR_DATE", input.author.git_date())
        .env("GIT_COMMITTER_NAME", env_value(&input.committer.name))
        .env("GIT_COMMITTER_EMAIL", env_value(&input.committer.email))
        .env("GIT_COMMITTER_DATE", input.committer.git_date());

    let out = run_raw(cmd, Some(input.message))?;
    Ok(String::from_utf8_lossy(&out).trim().to_string())
}

/// Applies `update-ref --stdin` instructions as a single transaction.
///
/// Either every instruction takes effect or none does.
///
/// # Parameters
///
/// * `dir` – Repository directory.
/// * `instructions` – Lines such as `update <ref> <new> <old>`, without
///   trailing newlines.
///
/// # Returns
///
/// * `Ok(())` once all refs moved. An empty list is a no-op.
/// * `Err(RewriteError::GitCommand)` if any instruction fails, in which case
///   no ref changed.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use git_identity_rewrite::git::update_refs;
///
/// let old = "1111111111111111111111111111111111111111";
/// let new = "2222222222222222222222222222222222222222";
/// update_refs(Path::new("."), &[format!("update refs/heads/main {} {}", new, old)])?;
/// # Ok::<(), git_identity_rewrite::error::RewriteError>(())
/// ```
pub fn update_refs(dir: &Path, instructions: &[String]) -> Result<(), RewriteError> {
    if instructions.is_empty() {
        return Ok(());
    }
    let mut cmd = git(dir);
    cmd.arg("update-ref").arg("--stdin");
    let input = instructions.join("\n") + "\n";
    run_raw(cmd, Some(input.as_bytes())).map(|_| ())
}

/// Checks the signature on a commit with `git verify-commit`.
///
/// # Parameters
///
/// * `dir` – Repository directory; its `gpg.*` settings decide how the
///   signature is checked.
/// * `oid` – Commit to verify.
///
/// # Returns
///
/// * `Ok(())` if git reports a good signature.
/// * `Err(RewriteError::GitCommand)` with git's stderr otherwise.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use git_identity_rewrite::git::verify_commit;
///
/// if let Err(e) = verify_commit(Path::new("."), "HEAD") {
///     eprintln!("HEAD is not signed: {}", e);
/// }
/// ```
pub fn verify_commit(dir: &Path, oid: &str) -> Result<(), RewriteError> {
    let mut cmd = git(dir);
    cmd.arg("verify-commit").arg(oid);
    run_raw(cmd, None).map(|_| ())
}
