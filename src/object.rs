//! Parsing and serialization of raw commit and tag objects.
//!
//! Objects are read with `git cat-file <type> <oid>`, which prints the
//! canonical object body: header lines, a blank line, then the message.
//! Header values may continue onto following lines that start with a
//! single space (used by `gpgsig` and `mergetag`).

use crate::error::RewriteError;
use crate::identity::{CommitIdentity, Signature};

/// A parsed commit object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub oid: String,
    pub tree: String,
    pub parents: Vec<String>,
    pub author: Signature,
    pub committer: Signature,
    pub encoding: Option<String>,
    /// Headers not carried into the rewritten commit (`gpgsig`, `mergetag`, ...).
    pub extra_headers: Vec<(String, Vec<u8>)>,
    pub message: Vec<u8>,
}

impl Commit {
    pub fn identity(&self) -> CommitIdentity {
        CommitIdentity {
            author: self.author.clone(),
            committer: self.committer.clone(),
        }
    }

    pub fn parse(oid: &str, raw: &[u8]) -> Result<Self, RewriteError> {
        let (headers, message) = split_object(raw);
        let headers = parse_headers(oid, headers)?;

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        let mut encoding = None;
        let mut extra_headers = Vec::new();

        for (key, value) in headers {
            match key.as_str() {
                "tree" => tree = Some(text(&value)),
                "parent" => parents.push(text(&value)),
                "author" => author = Some(parse_signature(oid, "author", &value)?),
                "committer" => committer = Some(parse_signature(oid, "committer", &value)?),
                "encoding" => encoding = Some(text(&value)),
                _ => extra_headers.push((key, value)),
            }
        }

        Ok(Self {
            oid: oid.to_string(),
            tree: tree.ok_or_else(|| missing(oid, "tree"))?,
            parents,
            author: author.ok_or_else(|| missing(oid, "author"))?,
            committer: committer.ok_or_else(|| missing(oid, "committer"))?,
            encoding,
            extra_headers,
            message: message.to_vec(),
        })
    }
}

/// A parsed annotated tag object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub oid: String,
    pub object: String,
    pub kind: String,
    pub name: String,
    pub tagger: Option<Signature>,
    /// Message without any trailing signature block.
    pub message: Vec<u8>,
    pub signed: bool,
}

const SIGNATURE_MARKERS: [&[u8]; 3] = [
    b"-----BEGIN PGP SIGNATURE-----",
    b"-----BEGIN SSH SIGNATURE-----",
    b"-----BEGIN SIGNED MESSAGE-----",
];

impl Tag {
    pub fn parse(oid: &str, raw: &[u8]) -> Result<Self, RewriteError> {
        let (headers, message) = split_object(raw);
        let headers = parse_headers(oid, headers)?;

        let mut object = None;
        let mut kind = None;
        let mut name = None;
        let mut tagger = None;
        let mut signed = false;

        for (key, value) in headers {
            match key.as_str() {
                "object" => object = Some(text(&value)),
                "type" => kind = Some(text(&value)),
                "tag" => name = Some(text(&value)),
                "tagger" => tagger = Some(parse_signature(oid, "tagger", &value)?),
                "gpgsig" | "gpgsig-sha256" => signed = true,
                _ => {}
            }
        }

        let (message, trailing_sig) = strip_signature(message);

        Ok(Self {
            oid: oid.to_string(),
            object: object.ok_or_else(|| missing(oid, "object"))?,
            kind: kind.ok_or_else(|| missing(oid, "type"))?,
            name: name.ok_or_else(|| missing(oid, "tag"))?,
            tagger,
            message: message.to_vec(),
            signed: signed || trailing_sig,
        })
    }

    /// Serializes the tag in canonical form, unsigned.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(format!("object {}\n", self.object).as_bytes());
        out.extend_from_slice(format!("type {}\n", self.kind).as_bytes());
        out.extend_from_slice(format!("tag {}\n", self.name).as_bytes());
        if let Some(tagger) = &self.tagger {
            out.extend_from_slice(b"tagger ");
            out.extend_from_slice(&tagger.to_bytes());
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }
}

fn split_object(raw: &[u8]) -> (&[u8], &[u8]) {
    if raw.starts_with(b"\n") {
        return (&raw[..0], &raw[1..]);
    }
    match raw.windows(2).position(|w| w == b"\n\n") {
        Some(i) => (&raw[..i + 1], &raw[i + 2..]),
        None => (raw, &raw[raw.len()..]),
    }
}

/// Splits header lines into `(key, value)` pairs.
///
/// Values stay as raw bytes: identity headers are not necessarily UTF-8.
fn parse_headers(oid: &str, headers: &[u8]) -> Result<Vec<(String, Vec<u8>)>, RewriteError> {
    let mut out: Vec<(String, Vec<u8>)> = Vec::new();

    for line in headers.split(|&b| b == b'\n').filter(|l| !l.is_empty()) {
        if let Some(cont) = line.strip_prefix(b" ") {
            match out.last_mut() {
                Some((_, value)) => {
                    value.push(b'\n');
                    value.extend_from_slice(cont);
                }
                None => {
                    return Err(RewriteError::MalformedObject {
                        oid: oid.to_string(),
                        detail: "continuation line before any header".to_string(),
                    });
                }
            }
            continue;
        }

        match line.iter().position(|&b| b == b' ') {
            Some(i) => out.push((text(&line[..i]), line[i + 1..].to_vec())),
            None => out.push((text(line), Vec::new())),
        }
    }

    Ok(out)
}

/// Header values that git always writes as ASCII (ids, types, names).
fn text(value: &[u8]) -> String {
    String::from_utf8_lossy(value).into_owned()
}

fn strip_signature(message: &[u8]) -> (&[u8], bool) {
    let start = SIGNATURE_MARKERS
        .iter()
        .filter_map(|marker| find_line_start(message, marker))
        .min();
    match start {
        Some(i) => (&message[..i], true),
        None => (message, false),
    }
}

fn find_line_start(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .enumerate()
        .find(|(i, w)| *w == needle && (*i == 0 || haystack[i - 1] == b'\n'))
        .map(|(i, _)| i)
}

fn parse_signature(oid: &str, header: &str, value: &[u8]) -> Result<Signature, RewriteError> {
    Signature::parse(value).ok_or_else(|| RewriteError::MalformedObject {
        oid: oid.to_string(),
        detail: format!("unparseable {} line: {}", header, String::from_utf8_lossy(value)),
    })
}

fn missing(oid: &str, header: &str) -> RewriteError {
    RewriteError::MalformedObject {
        oid: oid.to_string(),
        detail: format!("missing {} header", header),
    }
}
