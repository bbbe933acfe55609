use console::{measure_text_width, style};

use crate::identity::RewriteRule;
use crate::rewrite::BACKUP_NAMESPACE;

/// Prints the boxed summary shown before the rewrite starts.
///
/// The box is sized to the widest visible line, measured with
/// [`console::measure_text_width`] so embedded ANSI styling does not skew
/// the padding.
///
/// # Parameters
///
/// * `repo_name` – Repository being rewritten.
/// * `rule` – Sentinel email and replacement identity to display.
/// * `key_id` – Signing key the new commits will carry.
/// * `refs` – Number of branches and tags in scope.
///
/// # Output
///
/// Prints directly to standard output. It does not return any value.
///
/// # Examples
///
/// ```no_run
/// use git_identity_rewrite::banner::print_banner;
/// use git_identity_rewrite::identity::{Identity, RewriteRule};
///
/// let rule = RewriteRule::new("old@host", Identity::new("Jane Doe", "jane@example.com"));
/// print_banner("my-repo", &rule, "ABCD1234", 3);
/// ```
pub fn print_banner(repo_name: &str, rule: &RewriteRule, key_id: &str, refs: usize) {
    let lines = banner_lines(repo_name, rule, key_id, refs);

    let max_width = lines.iter().map(|l| measure_text_width(l)).max().unwrap_or(0) + 2;

    let border = "═".repeat(max_width);
    let edge = |s: String| style(s).blue().bold().to_string();
    let left = edge(String::from("║ "));
    let right = edge(String::from("║"));

    println!();
    println!("{}", edge(format!("╔{}╗", border)));
    for line in lines {
        // One column of padding already sits after the left border.
        let pad = max_width - measure_text_width(&line) - 1;
        println!("{}{}{}{}", left, line, " ".repeat(pad), right);
    }
    println!("{}", edge(format!("╚{}╝", border)));
    println!();
}

/// Lines of the banner, some carrying ANSI styling.
fn banner_lines(repo_name: &str, rule: &RewriteRule, key_id: &str, refs: usize) -> Vec<String> {
    vec![
        format!("Rewrite commit identities in {}", repo_name),
        String::new(),
        format!(
            "Replace:  {}",
            style(format!("<{}>", rule.sentinel)).yellow().bold()
        ),
        format!("With:     {}", style(&rule.replacement).cyan().bold()),
        format!("Sign key: {}", key_id),
        format!("Scope:    all branches and tags ({} refs)", refs),
        String::new(),
        String::from("Every commit is re-created and re-signed; dates are kept."),
        format!("Original refs are backed up under {}", BACKUP_NAMESPACE),
        style("Anyone who cloned this repository will need to re-clone.")
            .yellow()
            .to_string(),
    ]
}
