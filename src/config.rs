//! Run configuration.
//!
//! The sentinel email and the replacement identity are carried explicitly
//! in [`RewriteConfig`] and handed to the predicate; nothing is read from
//! the process environment.

use crate::identity::{Identity, RewriteRule};

/// Placeholder email found in the history to be cleaned up.
pub const DEFAULT_SENTINEL_EMAIL: &str = "notroot@beelink";

/// Name written in place of the sentinel identity.
pub const DEFAULT_REPLACEMENT_NAME: &str = "Wyatt Brege";

/// Email written in place of the sentinel identity.
pub const DEFAULT_REPLACEMENT_EMAIL: &str = "wyatt@brege.org";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteConfig {
    pub rule: RewriteRule,
    /// Key id given on the command line; `user.signingkey` is used otherwise.
    pub signing_key: Option<String>,
    /// Overwrite backups left by an earlier rewrite.
    pub force: bool,
    /// Skip the confirmation prompt.
    pub assume_yes: bool,
    /// Run `git verify-commit` on every new commit.
    pub verify: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            rule: RewriteRule::new(
                DEFAULT_SENTINEL_EMAIL,
                Identity::new(DEFAULT_REPLACEMENT_NAME, DEFAULT_REPLACEMENT_EMAIL),
            ),
            signing_key: None,
            force: false,
            assume_yes: false,
            verify: false,
        }
    }
}

impl RewriteConfig {
    /// Checks that the rule can actually change something.
    pub fn validate(&self) -> Result<(), String> {
        let rule = &self.rule;
        if rule.sentinel.trim().is_empty() {
            return Err(String::from("sentinel email must not be empty"));
        }
        if rule.replacement.name.trim().is_empty() || rule.replacement.email.trim().is_empty() {
            return Err(String::from("replacement name and email must not be empty"));
        }
        if rule.replacement.email == rule.sentinel {
            return Err(format!(
                "replacement email {} is the same as the sentinel",
                rule.replacement.email
            ));
        }
        Ok(())
    }
}
