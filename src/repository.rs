//! [`History`] backed by a real repository, driven through the `git` binary.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::RewriteError;
use crate::git;
use crate::object::{Commit, Tag};
use crate::rewrite::{BACKUP_NAMESPACE, History, RefEntry, RefTarget, RefUpdate, SCOPE};

const REF_FORMAT: &str = "%(refname)%09%(objectname)%09%(objecttype)%09%(*objectname)%09%(*objecttype)";

/// A repository on disk.
pub struct GitRepository {
    root: PathBuf,
}

impl GitRepository {
    /// Opens the repository containing `dir`.
    pub fn discover(dir: &Path) -> Result<Self, RewriteError> {
        let root = git::rev_parse(dir, "--show-toplevel")
            .map_err(|e| RewriteError::NotARepository(e.to_string()))?;
        Ok(Self {
            root: PathBuf::from(root),
        })
    }

    /// Opens a repository rooted at `root` without discovery.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name of the repository, for display.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("current repository")
            .to_string()
    }
}

/// Parses one line of [`REF_FORMAT`] output.
fn parse_ref_line(line: &str) -> Option<RefEntry> {
    let mut fields = line.split('\t');
    let name = fields.next()?.to_string();
    let oid = fields.next()?.to_string();
    let kind = fields.next()?;
    let peeled = fields.next().unwrap_or("");
    let peeled_kind = fields.next().unwrap_or("");

    let target = match (kind, peeled_kind) {
        ("commit", _) => RefTarget::Commit,
        ("tag", "commit") => RefTarget::AnnotatedTag {
            commit: peeled.to_string(),
        },
        _ => RefTarget::Other,
    };

    Some(RefEntry { name, oid, target })
}

/// `update-ref --stdin` instructions for a rewrite.
///
/// Each ref is moved with an old-value check and its previous value is
/// stored under the backup namespace, overwriting any earlier backup.
pub(crate) fn swap_instructions(updates: &[RefUpdate]) -> Vec<String> {
    let mut lines = Vec::with_capacity(updates.len() * 2);
    for u in updates {
        lines.push(format!("update {} {} {}", u.name, u.new, u.old));
        lines.push(format!("update {}{} {}", BACKUP_NAMESPACE, u.name, u.old));
    }
    lines
}

impl History for GitRepository {
    fn refs(&self) -> Result<Vec<RefEntry>, RewriteError> {
        let lines = git::for_each_ref(&self.root, REF_FORMAT, &SCOPE)?;
        Ok(lines.iter().filter_map(|l| parse_ref_line(l)).collect())
    }

    fn has_backups(&self) -> Result<bool, RewriteError> {
        let lines = git::for_each_ref(&self.root, "%(refname)", &[BACKUP_NAMESPACE])?;
        Ok(!lines.is_empty())
    }

    fn topo_order(&self, tips: &[String]) -> Result<Vec<String>, RewriteError> {
        git::rev_list_topo(&self.root, tips)
    }

    fn read_commit(&self, oid: &str) -> Result<Commit, RewriteError> {
        let raw = git::cat_file(&self.root, "commit", oid)?;
        Commit::parse(oid, &raw)
    }

    fn read_tag(&self, oid: &str) -> Result<Tag, RewriteError> {
        let raw = git::cat_file(&self.root, "tag", oid)?;
        Tag::parse(oid, &raw)
    }

    fn write_tag(&mut self, tag: &Tag) -> Result<String, RewriteError> {
        let oid = git::hash_object(&self.root, "tag", &tag.to_bytes())?;
        debug!(name = %tag.name, old = %tag.oid, new = %oid, "rewrote tag");
        Ok(oid)
    }

    fn swap_refs(&mut self, updates: &[RefUpdate]) -> Result<(), RewriteError> {
        git::update_refs(&self.root, &swap_instructions(updates))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::git::{CommitTree, Signing};
    use crate::identity::Signature;
    use crate::rewrite::{RewriteOptions, commits_with_email, rewrite_history, tests::rule};
    use std::process::Command;

    #[test]
    fn parses_commit_ref() {
        let e = parse_ref_line("refs/heads/main\tabc\tcommit\t\t").unwrap();
        assert_eq!(e.name, "refs/heads/main");
        assert_eq!(e.target, RefTarget::Commit);
    }

    #[test]
    fn parses_annotated_tag_ref() {
        let e = parse_ref_line("refs/tags/v1\ttagoid\ttag\tcommitoid\tcommit").unwrap();
        assert_eq!(
            e.target,
            RefTarget::AnnotatedTag {
                commit: "commitoid".into()
            }
        );
    }

    #[test]
    fn tag_of_tree_is_other() {
        let e = parse_ref_line("refs/tags/t\ttagoid\ttag\ttreeoid\ttree").unwrap();
        assert_eq!(e.target, RefTarget::Other);
    }

    #[test]
    fn swap_is_one_transaction_with_backups() {
        let lines = swap_instructions(&[RefUpdate {
            name: "refs/heads/main".into(),
            old: "old1".into(),
            new: "new1".into(),
        }]);
        assert_eq!(
            lines,
            vec![
                "update refs/heads/main new1 old1",
                "update refs/original/refs/heads/main old1",
            ]
        );
    }

    /// Runs git in `dir` with a fixed identity and no system config.
    pub(crate) fn git_in(dir: &Path, args: &[&str]) -> String {
        let out = Command::new("git")
            .current_dir(dir)
            .args(args)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_AUTHOR_NAME", "Tagger")
            .env("GIT_AUTHOR_EMAIL", "notroot@beelink")
            .env("GIT_COMMITTER_NAME", "Tagger")
            .env("GIT_COMMITTER_EMAIL", "notroot@beelink")
            .output()
            .expect("failed to run git");
        assert!(out.status.success(), "git {:?}: {}", args, String::from_utf8_lossy(&out.stderr));
        String::from_utf8_lossy(&out.stdout).trim().to_string()
    }

    pub(crate) fn sig(name: &str, email: &str, date: &str) -> Signature {
        Signature {
            name: name.into(),
            email: email.into(),
            date: date.into(),
        }
    }

    pub(crate) fn make_commit(dir: &Path, tree: &str, parents: &[String], author: Signature, committer: Signature, msg: &str) -> String {
        make_encoded_commit(dir, tree, parents, author, committer, None, msg.as_bytes())
    }

    pub(crate) fn make_encoded_commit(
        dir: &Path,
        tree: &str,
        parents: &[String],
        author: Signature,
        committer: Signature,
        encoding: Option<&str>,
        msg: &[u8],
    ) -> String {
        git::commit_tree(
            dir,
            &CommitTree {
                tree,
                parents,
                author: &author,
                committer: &committer,
                encoding,
                message: msg,
            },
            &Signing::Disabled,
        )
        .expect("commit-tree failed")
    }

    /// A <- B <- C on `main`, `v1` lightweight at B, `v2` annotated at C.
    fn fixture() -> Option<(tempfile::TempDir, GitRepository, [String; 3])> {
        if which::which("git").is_err() {
            return None;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let p = dir.path();
        git_in(p, &["init", "-q"]);
        let tree = git::hash_object(p, "tree", b"").expect("empty tree");

        let a = make_commit(
            p,
            &tree,
            &[],
            sig("Alice", "alice@example.com", "1600000000 +0200"),
            sig("notroot", "notroot@beelink", "1600000010 +0200"),
            "A\n",
        );
        let b = make_commit(
            p,
            &tree,
            &[a.clone()],
            sig("notroot", "notroot@beelink", "1600000100 -0700"),
            sig("Alice", "alice@example.com", "1600000110 -0700"),
            "B\n",
        );
        let c = make_commit(
            p,
            &tree,
            &[b.clone()],
            sig("Alice", "alice@example.com", "1600000200 +0000"),
            sig("Bob", "bob@example.com", "1600000210 +0000"),
            "C\n\nbody\n",
        );
        git_in(p, &["update-ref", "refs/heads/main", &c]);
        git_in(p, &["update-ref", "refs/tags/v1", &b]);
        git_in(p, &["-c", "tag.gpgSign=false", "tag", "-a", "-m", "second", "v2", &c]);

        let repo = GitRepository::at(p);
        Some((dir, repo, [a, b, c]))
    }

    fn unsigned(root: PathBuf) -> impl FnMut(&crate::rewrite::CommitDraft) -> Result<String, RewriteError> {
        move |d| {
            git::commit_tree(
                &root,
                &CommitTree {
                    tree: &d.tree,
                    parents: &d.parents,
                    author: &d.identity.author,
                    committer: &d.identity.committer,
                    encoding: d.encoding.as_deref(),
                    message: &d.message,
                },
                &Signing::Disabled,
            )
        }
    }

    #[test]
    fn lists_refs_and_reads_commits() {
        let Some((_dir, repo, [a, b, c])) = fixture() else {
            return;
        };
        let refs = repo.refs().unwrap();
        assert_eq!(refs.len(), 3);
        let v2 = refs.iter().find(|r| r.name == "refs/tags/v2").unwrap();
        assert_eq!(v2.commit(), Some(c.as_str()));

        assert_eq!(repo.topo_order(&[c.clone()]).unwrap(), vec![a, b.clone(), c]);

        let commit = repo.read_commit(&b).unwrap();
        assert_eq!(commit.author.email, b"notroot@beelink");
        assert_eq!(commit.author.date, "1600000100 -0700");
        assert!(!repo.has_backups().unwrap());
    }

    #[test]
    fn rewrites_real_repository() {
        let Some((_dir, mut repo, [a, b, c])) = fixture() else {
            return;
        };
        let rule = rule();
        let options = RewriteOptions {
            force: false,
            tagger_rule: Some(rule.clone()),
        };
        let construct = unsigned(repo.root().to_path_buf());
        let report = rewrite_history(&mut repo, &options, |id| rule.apply(id), construct).unwrap();

        assert_eq!(report.rewritten.len(), 3);
        assert_eq!(report.identities_changed, 2);

        let new_a = repo.read_commit(report.new_commit(&a).unwrap()).unwrap();
        let new_b = repo.read_commit(report.new_commit(&b).unwrap()).unwrap();
        let new_c = repo.read_commit(report.new_commit(&c).unwrap()).unwrap();

        assert_eq!(new_a.committer.to_string(), "Wyatt Brege <wyatt@brege.org> 1600000010 +0200");
        assert_eq!(new_a.author.email, b"alice@example.com");
        assert_eq!(new_b.author.to_string(), "Wyatt Brege <wyatt@brege.org> 1600000100 -0700");
        assert_eq!(new_b.parents, vec![new_a.oid.clone()]);
        assert_eq!(new_c.author.to_string(), "Alice <alice@example.com> 1600000200 +0000");
        assert_eq!(new_c.committer.to_string(), "Bob <bob@example.com> 1600000210 +0000");
        assert_eq!(new_c.parents, vec![new_b.oid.clone()]);
        assert_eq!(new_c.message, b"C\n\nbody\n");

        let p = repo.root().to_path_buf();
        assert_eq!(git_in(&p, &["rev-parse", "refs/heads/main"]), new_c.oid);
        assert_eq!(git_in(&p, &["rev-parse", "refs/tags/v1"]), new_b.oid);
        assert_eq!(git_in(&p, &["rev-parse", "refs/tags/v2^{commit}"]), new_c.oid);
        assert_eq!(git_in(&p, &["rev-parse", "refs/original/refs/heads/main"]), c);

        let tag = repo.read_tag(&git_in(&p, &["rev-parse", "refs/tags/v2"])).unwrap();
        assert_eq!(tag.tagger.unwrap().email, b"wyatt@brege.org");

        assert!(commits_with_email(&repo, "notroot@beelink").unwrap().is_empty());
        assert!(repo.has_backups().unwrap());

        let again = rewrite_history(
            &mut repo,
            &RewriteOptions::default(),
            |id| rule.apply(id),
            unsigned(p.clone()),
        );
        assert!(matches!(again, Err(RewriteError::AlreadyRewritten { .. })));
    }

    /// Raw `cat-file commit` output for the rewritten counterpart of `old`.
    fn raw_rewritten(repo: &GitRepository, report: &crate::rewrite::RewriteReport, old: &str) -> Vec<u8> {
        let new = report.new_commit(old).expect("commit was rewritten");
        git::cat_file(repo.root(), "commit", new).expect("cat-file")
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn latin1_identity_survives_rewrite() {
        if which::which("git").is_err() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let p = dir.path();
        git_in(p, &["init", "-q"]);
        let tree = git::hash_object(p, "tree", b"").expect("empty tree");

        let jorg = Signature {
            name: b"J\xf6rg".to_vec(),
            email: b"jorg@example.com".to_vec(),
            date: "1600000000 +0100".into(),
        };
        let x = make_encoded_commit(
            p,
            &tree,
            &[],
            jorg.clone(),
            sig("notroot", "notroot@beelink", "1600000001 +0100"),
            Some("ISO-8859-1"),
            b"Gr\xfc\xdfe\n",
        );
        let y = make_encoded_commit(p, &tree, &[x.clone()], jorg.clone(), jorg, Some("ISO-8859-1"), b"Y\n");
        git_in(p, &["update-ref", "refs/heads/main", &y]);

        let mut repo = GitRepository::at(p);
        let rule = rule();
        let report = rewrite_history(
            &mut repo,
            &RewriteOptions::default(),
            |id| rule.apply(id),
            unsigned(p.to_path_buf()),
        )
        .unwrap();

        let new_x = raw_rewritten(&repo, &report, &x);
        assert!(contains(&new_x, b"\nauthor J\xf6rg <jorg@example.com> 1600000000 +0100\n"));
        assert!(contains(&new_x, b"\ncommitter Wyatt Brege <wyatt@brege.org> 1600000001 +0100\n"));
        assert!(contains(&new_x, b"\nencoding ISO-8859-1\n"));
        assert!(new_x.ends_with(b"\n\nGr\xfc\xdfe\n"));

        // Neither side matched, so the identity bytes are passed through as-is.
        let new_y = raw_rewritten(&repo, &report, &y);
        assert!(contains(&new_y, b"\nauthor J\xf6rg <jorg@example.com> 1600000000 +0100\n"));
        assert!(contains(&new_y, b"\ncommitter J\xf6rg <jorg@example.com> 1600000000 +0100\n"));
        assert!(!contains(&new_y, "\u{fffd}".as_bytes()));
    }

    #[test]
    fn merge_and_encoding_survive_rewrite() {
        if which::which("git").is_err() {
            return;
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let p = dir.path();
        git_in(p, &["init", "-q"]);
        let tree = git::hash_object(p, "tree", b"").expect("empty tree");
        let alice = || sig("Alice", "alice@example.com", "1600000000 +0000");
        let sentinel = || sig("notroot", "notroot@beelink", "1600000050 +0000");

        let a = make_commit(p, &tree, &[], sentinel(), alice(), "A\n");
        let left = make_commit(p, &tree, &[a.clone()], alice(), sentinel(), "left\n");
        let right = make_encoded_commit(
            p,
            &tree,
            &[a.clone()],
            sentinel(),
            sentinel(),
            Some("ISO-8859-1"),
            b"r\xe9sum\xe9\n",
        );
        let merge = make_commit(p, &tree, &[left.clone(), right.clone()], alice(), alice(), "merge\n");
        git_in(p, &["update-ref", "refs/heads/main", &merge]);
        git_in(p, &["update-ref", "refs/heads/side", &right]);

        let mut repo = GitRepository::at(p);
        let rule = rule();
        let report = rewrite_history(
            &mut repo,
            &RewriteOptions::default(),
            |id| rule.apply(id),
            unsigned(p.to_path_buf()),
        )
        .unwrap();
        assert_eq!(report.rewritten.len(), 4);

        let new_left = report.new_commit(&left).unwrap().to_string();
        let new_right = report.new_commit(&right).unwrap().to_string();
        let new_merge = repo.read_commit(report.new_commit(&merge).unwrap()).unwrap();
        assert_eq!(new_merge.parents, vec![new_left, new_right.clone()]);

        let r = repo.read_commit(&new_right).unwrap();
        assert_eq!(r.encoding.as_deref(), Some("ISO-8859-1"));
        assert_eq!(r.message, b"r\xe9sum\xe9\n");
        assert_eq!(r.author.email, b"wyatt@brege.org");
        assert_eq!(r.parents, vec![report.new_commit(&a).unwrap().to_string()]);

        assert_eq!(git_in(p, &["rev-parse", "refs/heads/side"]), new_right);
        assert_eq!(git_in(p, &["rev-parse", "refs/heads/main"]), new_merge.oid);
        assert!(commits_with_email(&repo, "notroot@beelink").unwrap().is_empty());
    }
}
