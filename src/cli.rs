use std::path::Path;

use clap::{ArgAction, Parser};
use console::style;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::audit;
use crate::banner::print_banner;
use crate::config::{
    DEFAULT_REPLACEMENT_EMAIL, DEFAULT_REPLACEMENT_NAME, DEFAULT_SENTINEL_EMAIL, RewriteConfig,
};
use crate::error::RewriteError;
use crate::git;
use crate::identity::{Identity, RewriteRule};
use crate::prompt::{self, ConfirmPrompter, DialoguerConfirmPrompter};
use crate::repository::GitRepository;
use crate::rewrite::{self, CommitDraft, History, RewriteOptions, RewriteReport};
use crate::signer::{self, CommitSigner};

/// Rewrite the author and committer identity across every branch and tag,
/// re-signing each rewritten commit and keeping the original dates.
#[derive(Parser, Debug)]
#[command(name = "git-identity-rewrite", version)]
pub struct Cli {
    /// Email to replace wherever it appears as author or committer.
    #[arg(long, value_name = "EMAIL", default_value = DEFAULT_SENTINEL_EMAIL)]
    pub old_email: String,

    /// Replacement name.
    #[arg(long, default_value = DEFAULT_REPLACEMENT_NAME)]
    pub name: String,

    /// Replacement email.
    #[arg(long, value_name = "EMAIL", default_value = DEFAULT_REPLACEMENT_EMAIL)]
    pub email: String,

    /// Key to sign with [default: `git config user.signingkey`].
    #[arg(short = 'k', long, value_name = "KEYID")]
    pub signing_key: Option<String>,

    /// Run even if refs/original/ holds backups from an earlier rewrite.
    #[arg(short, long)]
    pub force: bool,

    /// Do not ask for confirmation.
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Verify the signature of every rewritten commit before moving any ref.
    #[arg(long)]
    pub verify: bool,

    /// More log output (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn config(&self) -> RewriteConfig {
        RewriteConfig {
            rule: RewriteRule::new(
                self.old_email.clone(),
                Identity::new(self.name.clone(), self.email.clone()),
            ),
            signing_key: self.signing_key.clone(),
            force: self.force,
            assume_yes: self.yes,
            verify: self.verify,
        }
    }
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
}

/// Ensures `git` is installed and returns the repository around the
/// current directory.
fn verify_environment() -> Result<GitRepository, RewriteError> {
    which::which("git").map_err(|_| RewriteError::GitNotFound)?;
    GitRepository::discover(Path::new("."))
}

fn print_summary(report: &RewriteReport) {
    println!(
        "{}",
        style(format!(
            "✅ Rewrote {} commits ({} with a new identity) and moved {} refs.",
            report.rewritten.len(),
            report.identities_changed,
            report.ref_updates.len()
        ))
        .green()
        .bold()
    );
    for u in &report.ref_updates {
        println!(
            "   {} {} → {}",
            u.name,
            style(short(&u.old)).dim(),
            style(short(&u.new)).green()
        );
    }
}

fn short(oid: &str) -> &str {
    oid.get(..10).unwrap_or(oid)
}

/// Signs `draft` and, when `verify` is set, checks the new signature
/// with `git verify-commit` before handing the id back.
///
/// Running the check here, inside the walk, means a commit that does not
/// verify aborts the rewrite before any ref is moved.
fn sign_checked(
    signer: &CommitSigner,
    root: &Path,
    verify: bool,
    draft: &CommitDraft,
) -> Result<String, RewriteError> {
    let oid = signer.sign(draft)?;
    if verify {
        audit::verify_signatures([oid.as_str()], |o| git::verify_commit(root, o))?;
    }
    Ok(oid)
}

/// Runs the whole operation against `repo`.
///
/// Returns `Ok(0)` on success, when there is nothing to rewrite, or when the
/// user declines; every failure is returned as an error.
pub fn run<P: ConfirmPrompter>(
    repo: &mut GitRepository,
    config: &RewriteConfig,
    prompter: &mut P,
) -> Result<i32, RewriteError> {
    config.validate().map_err(RewriteError::Config)?;

    let refs = repo.refs()?;
    if refs.is_empty() {
        println!(
            "{}",
            style("No branches or tags found; nothing to rewrite.").yellow().bold()
        );
        return Ok(0);
    }

    let key = signer::preflight(repo.root(), config.signing_key.as_deref())?;
    rewrite::check_not_rewritten(&*repo, config.force)?;

    let repo_name = repo.name();
    print_banner(&repo_name, &config.rule, &key.id, refs.len());

    if !config.assume_yes {
        let go = prompt::confirm_start(prompter, &repo_name, refs.len()).map_err(RewriteError::Prompt)?;
        if !go {
            println!("{}", style("Canceled by user. No changes made.").yellow().bold());
            return Ok(0);
        }
    }

    let root = repo.root().to_path_buf();
    let signer = CommitSigner::new(root.clone(), key);
    let options = RewriteOptions {
        force: config.force,
        tagger_rule: Some(config.rule.clone()),
    };
    let rule = &config.rule;
    let report = rewrite::rewrite_history(
        repo,
        &options,
        |id| rule.apply(id),
        |draft| sign_checked(&signer, &root, config.verify, draft),
    )?;
    if config.verify {
        info!(commits = report.rewritten.len(), "every rewritten commit verified");
    }

    audit::ensure_sentinel_gone(&*repo, &rule.sentinel)?;

    print_summary(&report);
    info!(backups = rewrite::BACKUP_NAMESPACE, "original refs kept for recovery");
    Ok(0)
}

/// Main CLI entry point for `git-identity-rewrite`.
///
/// 1. Parses flags and sets up logging.
/// 2. Verifies `git` is installed and locates the repository.
/// 3. Stops early if there are no branches or tags.
/// 4. Resolves the signing key and checks the already-rewritten guard.
/// 5. Shows the banner and asks for confirmation.
/// 6. Rewrites and re-signs every commit (verifying each one with
///    `--verify`), then swaps the refs in one step.
/// 7. Audits the result.
///
/// # Exit Codes
///
/// * `0` on success, when there is nothing to do, or when the user cancels.
/// * Non-zero (via `Err`) on any failure.
pub fn entry() -> Result<i32, RewriteError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut repo = verify_environment()?;
    let config = cli.config();
    run(&mut repo, &config, &mut DialoguerConfirmPrompter)
}
