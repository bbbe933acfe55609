//! # git-identity-rewrite
//!
//! A CLI tool to replace a placeholder author/committer identity across the
//! whole history of a Git repository, re-signing every rewritten commit.
//!
//! This crate provides functionality to:
//! - Decide a commit's new identity from a sentinel email and a replacement
//! - Walk every commit reachable from all branches and tags, parents first
//! - Write each replacement with `git commit-tree -S`, keeping the original dates
//! - Swap all refs in one transaction, backing up the old values
//!
//! ## Usage
//!
//! ```bash
//! # Replace notroot@beelink with the default identity, signing with user.signingkey
//! git-identity-rewrite
//!
//! # Different identities, explicit key, verify each signature before the swap
//! git-identity-rewrite --old-email me@laptop --name "Me" --email me@example.com -k ABCD1234 --verify
//! ```
//!
//! ## Modules
//!
//! - [`cli`] - Command-line interface and main entry point
//! - [`config`] - Run configuration and defaults
//! - [`identity`] - Identity types and the rewrite rule
//! - [`object`] - Commit and tag object parsing
//! - [`rewrite`] - History traversal and ref swap
//! - [`repository`] - `git`-backed repository access
//! - [`signer`] - Signed commit construction
//! - [`audit`] - Post-rewrite checks
//! - [`git`] - Git command wrappers
//! - [`prompt`] - Confirmation prompt abstraction
//! - [`banner`] - Decorative CLI banner
//! - [`error`] - Error type

pub mod audit;
pub mod banner;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod identity;
pub mod object;
pub mod prompt;
pub mod repository;
pub mod rewrite;
pub mod signer;
