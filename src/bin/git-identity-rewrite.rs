use console::style;

/// Entry point for the `git-identity-rewrite` binary.
///
/// Runs the CLI and exits with its code. Errors are printed to stderr and
/// exit with status 1.
fn main() {
    match git_identity_rewrite::cli::entry() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", style(format!("❌ Error: {}", e)).red().bold());
            std::process::exit(1);
        }
    }
}
