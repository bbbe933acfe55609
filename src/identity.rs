use std::fmt;

/// A name and email pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// An author or committer line: identity plus the raw git date.
///
/// Name and email are kept as the bytes found in the object. Git does not
/// require them to be UTF-8 (a commit with an `encoding` header stores them
/// in that encoding), so they are only decoded for display. `date` keeps the
/// exact `"<unix-seconds> <tz>"` text so that it can be written back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: Vec<u8>,
    pub email: Vec<u8>,
    pub date: String,
}

impl Signature {
    /// Parses the value of an `author`, `committer` or `tagger` header,
    /// e.g. `Jane Doe <jane@example.com> 1700000000 +0100`.
    ///
    /// Returns `None` when the angle-bracketed email is missing.
    pub fn parse(value: &[u8]) -> Option<Self> {
        let close = value.iter().rposition(|&b| b == b'>')?;
        let open = value[..close].iter().rposition(|&b| b == b'<')?;

        Some(Self {
            name: value[..open].trim_ascii().to_vec(),
            email: value[open + 1..close].to_vec(),
            date: String::from_utf8_lossy(value[close + 1..].trim_ascii()).into_owned(),
        })
    }

    /// Date in the form accepted by `GIT_AUTHOR_DATE` / `GIT_COMMITTER_DATE`.
    pub fn git_date(&self) -> String {
        format!("@{}", self.date)
    }

    /// Returns `true` if the email is exactly `email`, byte for byte.
    pub fn has_email(&self, email: &str) -> bool {
        self.email == email.as_bytes()
    }

    /// The header value as stored in an object: `name <email> date`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.name.len() + self.email.len() + self.date.len() + 4);
        out.extend_from_slice(&self.name);
        out.extend_from_slice(b" <");
        out.extend_from_slice(&self.email);
        out.extend_from_slice(b"> ");
        out.extend_from_slice(self.date.as_bytes());
        out
    }

    fn replaced_by(&self, replacement: &Identity) -> Self {
        Self {
            name: replacement.name.clone().into_bytes(),
            email: replacement.email.clone().into_bytes(),
            date: self.date.clone(),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.to_bytes()))
    }
}

/// The author and committer of one commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub author: Signature,
    pub committer: Signature,
}

/// Replaces `sentinel` emails with a fixed identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRule {
    pub sentinel: String,
    pub replacement: Identity,
}

impl RewriteRule {
    pub fn new(sentinel: impl Into<String>, replacement: Identity) -> Self {
        Self {
            sentinel: sentinel.into(),
            replacement,
        }
    }

    /// Applies the rule to one author/committer line.
    ///
    /// The email is compared byte for byte. A signature that does not match
    /// is returned unchanged, including names that are not valid UTF-8.
    /// Dates are never touched.
    pub fn apply_signature(&self, sig: &Signature) -> Signature {
        if sig.has_email(&self.sentinel) {
            sig.replaced_by(&self.replacement)
        } else {
            sig.clone()
        }
    }

    /// Applies the rule to both sides of a commit.
    ///
    /// Author and committer are decided independently of each other.
    pub fn apply(&self, identity: &CommitIdentity) -> CommitIdentity {
        CommitIdentity {
            author: self.apply_signature(&identity.author),
            committer: self.apply_signature(&identity.committer),
        }
    }

    /// Returns `true` if either the author or the committer uses the sentinel.
    pub fn matches(&self, identity: &CommitIdentity) -> bool {
        identity.author.has_email(&self.sentinel) || identity.committer.has_email(&self.sentinel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(name: &str, email: &str, date: &str) -> Signature {
        Signature {
            name: name.into(),
            email: email.into(),
            date: date.to_string(),
        }
    }

    fn rule() -> RewriteRule {
        RewriteRule::new(
            "notroot@beelink",
            Identity::new("Wyatt Brege", "wyatt@brege.org"),
        )
    }

    #[test]
    fn parse_full_line() {
        let s = Signature::parse(b"Jane Doe <jane@example.com> 1700000000 +0100").unwrap();
        assert_eq!(s, sig("Jane Doe", "jane@example.com", "1700000000 +0100"));
    }

    #[test]
    fn parse_empty_name() {
        let s = Signature::parse(b"<root@host> 1 +0000").unwrap();
        assert!(s.name.is_empty());
        assert_eq!(s.email, b"root@host");
    }

    #[test]
    fn parse_missing_email_is_none() {
        assert!(Signature::parse(b"Jane Doe 1700000000 +0100").is_none());
    }

    #[test]
    fn display_round_trips_header_value() {
        let line = "Jane Doe <jane@example.com> 1700000000 -0700";
        assert_eq!(Signature::parse(line.as_bytes()).unwrap().to_string(), line);
    }

    #[test]
    fn git_date_uses_raw_epoch_form() {
        let s = sig("A", "a@b", "1700000000 +0530");
        assert_eq!(s.git_date(), "@1700000000 +0530");
    }

    #[test]
    fn committer_only_match() {
        let id = CommitIdentity {
            author: sig("Alice", "alice@example.com", "10 +0000"),
            committer: sig("notroot", "notroot@beelink", "20 +0200"),
        };
        let out = rule().apply(&id);
        assert_eq!(out.author, id.author);
        assert_eq!(out.committer, sig("Wyatt Brege", "wyatt@brege.org", "20 +0200"));
    }

    #[test]
    fn author_only_match() {
        let id = CommitIdentity {
            author: sig("notroot", "notroot@beelink", "10 +0000"),
            committer: sig("Alice", "alice@example.com", "20 +0000"),
        };
        let out = rule().apply(&id);
        assert_eq!(out.author, sig("Wyatt Brege", "wyatt@brege.org", "10 +0000"));
        assert_eq!(out.committer, id.committer);
    }

    #[test]
    fn both_match() {
        let id = CommitIdentity {
            author: sig("x", "notroot@beelink", "10 +0000"),
            committer: sig("y", "notroot@beelink", "11 -0100"),
        };
        let out = rule().apply(&id);
        assert_eq!(out.author.name, b"Wyatt Brege");
        assert_eq!(out.committer.email, b"wyatt@brege.org");
        assert_eq!(out.author.date, "10 +0000");
        assert_eq!(out.committer.date, "11 -0100");
        assert!(rule().matches(&id));
    }

    #[test]
    fn neither_match_passes_through() {
        let id = CommitIdentity {
            author: sig("Alice", "alice@example.com", "10 +0000"),
            committer: sig("Bob", "bob@example.com", "20 +0000"),
        };
        assert_eq!(rule().apply(&id), id);
        assert!(!rule().matches(&id));
    }

    #[test]
    fn comparison_is_exact() {
        let id = CommitIdentity {
            author: sig("x", "NotRoot@Beelink", "1 +0000"),
            committer: sig("y", " notroot@beelink", "1 +0000"),
        };
        assert_eq!(rule().apply(&id), id);
    }

    #[test]
    fn latin1_name_is_kept_byte_for_byte() {
        let raw = b"J\xf6rg <jorg@example.com> 1700000000 +0100";
        let s = Signature::parse(raw).unwrap();
        assert_eq!(s.name, b"J\xf6rg");
        assert_eq!(s.to_bytes(), raw);

        let id = CommitIdentity {
            author: s.clone(),
            committer: s,
        };
        assert_eq!(rule().apply(&id), id);
    }

    #[test]
    fn latin1_name_with_sentinel_email_is_replaced() {
        let s = Signature::parse(b"J\xf6rg <notroot@beelink> 5 +0000").unwrap();
        let out = rule().apply_signature(&s);
        assert_eq!(out.name, b"Wyatt Brege");
        assert_eq!(out.date, "5 +0000");
    }
}
