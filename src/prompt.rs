use dialoguer::{Confirm, theme::ColorfulTheme};

/// Abstraction over a boolean (yes/no) confirmation prompt.
///
/// Lets the confirmation step be mocked in tests.
pub trait ConfirmPrompter {
    /// Prompt the user for a yes/no answer, with `default` on Enter.
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, String>;
}

/// `ConfirmPrompter` backed by `dialoguer::Confirm` with `ColorfulTheme`.
pub struct DialoguerConfirmPrompter;

impl ConfirmPrompter for DialoguerConfirmPrompter {
    fn confirm(&mut self, prompt: &str, default: bool) -> Result<bool, String> {
        let theme = ColorfulTheme::default();
        Confirm::with_theme(&theme)
            .with_prompt(prompt)
            .default(default)
            .interact()
            .map_err(|e| e.to_string())
    }
}

/// Builds the confirmation question for rewriting `repo_name`.
///
/// # Parameters
///
/// * `repo_name` – Name shown in the question, usually the repository's
///   directory name.
/// * `refs` – Number of branches and tags that will move.
///
/// # Returns
///
/// The question text, with "ref" pluralized to match `refs`.
///
/// # Examples
///
/// ```
/// use git_identity_rewrite::prompt::start_prompt;
///
/// assert_eq!(
///     start_prompt("dotfiles", 2),
///     "Rewrite and re-sign the history of dotfiles (2 branch/tag refs)?"
/// );
/// ```
pub fn start_prompt(repo_name: &str, refs: usize) -> String {
    format!(
        "Rewrite and re-sign the history of {} ({} branch/tag ref{})?",
        repo_name,
        refs,
        if refs == 1 { "" } else { "s" }
    )
}

/// Asks whether to begin rewriting. Defaults to "no": this replaces every
/// commit in the repository.
///
/// # Parameters
///
/// * `prompter` – Where the question is asked; [`DialoguerConfirmPrompter`]
///   in the binary, a mock in tests.
/// * `repo_name` – Repository named in the question.
/// * `refs` – Number of branches and tags that will move.
///
/// # Returns
///
/// * `Ok(true)` if the user agreed.
/// * `Ok(false)` if the user declined or just pressed Enter.
/// * `Err(String)` if the prompt could not be shown (e.g. no terminal).
///
/// # Examples
///
/// ```no_run
/// use git_identity_rewrite::prompt::{confirm_start, DialoguerConfirmPrompter};
///
/// if confirm_start(&mut DialoguerConfirmPrompter, "dotfiles", 3).unwrap_or(false) {
///     println!("rewriting");
/// }
/// ```
pub fn confirm_start<P: ConfirmPrompter>(prompter: &mut P, repo_name: &str, refs: usize) -> Result<bool, String> {
    prompter.confirm(&start_prompt(repo_name, refs), false)
}
