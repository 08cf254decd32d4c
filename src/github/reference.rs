// src/github/reference.rs
// =============================================================================
// Turns user input into a structured `RepoReference`.
//
// Supported inputs:
//   - https://github.com/owner/repo            (also .git, www., no scheme)
//   - https://github.com/owner/repo/tree/<ref>/<path...>
//   - https://github.com/owner/repo/blob/<ref>/<path...>/file  -> parent folder
//   - owner/repo  or  owner/repo/<path...>
//
// `--path`, `--ref` and `--ref-kind` flags win over whatever the URL carries.
//
// A missing ref is not an error: the fetcher gets an ordered candidate list
// (main, master, develop) and stops at the first one that exists.
// =============================================================================

use crate::error::{GrabError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Branches tried, in this order, when no ref was given
pub const FALLBACK_BRANCHES: [&str; 3] = ["main", "master", "develop"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Branch,
    Tag,
    Commit,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefKind::Branch => "branch",
            RefKind::Tag => "tag",
            RefKind::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// One entry of the ordered list of refs the fetcher will try
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefCandidate {
    pub name: String,
    pub kind: RefKind,
}

impl RefCandidate {
    pub fn branch(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: RefKind::Branch,
        }
    }

    /// Archive download URL for this ref.
    ///
    /// Branches and tags go through `archive/refs/{heads,tags}/`, commits use
    /// the bare SHA form.
    pub fn archive_url(&self, base_url: &str, owner: &str, repo: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match self.kind {
            RefKind::Branch => format!(
                "{}/{}/{}/archive/refs/heads/{}.tar.gz",
                base, owner, repo, self.name
            ),
            RefKind::Tag => format!(
                "{}/{}/{}/archive/refs/tags/{}.tar.gz",
                base, owner, repo, self.name
            ),
            RefKind::Commit => format!("{}/{}/{}/archive/{}.tar.gz", base, owner, repo, self.name),
        }
    }
}

/// Raw user input plus the optional flag overrides
#[derive(Debug, Clone, Default)]
pub struct ReferenceInput {
    pub source: String,
    pub path: Option<String>,
    pub git_ref: Option<String>,
    pub ref_kind: Option<RefKind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoReference {
    pub owner: String,
    pub repo: String,
    /// `None` means "unspecified": use the fallback branches
    pub git_ref: Option<String>,
    pub ref_kind: RefKind,
    pub sub_path: Vec<String>,
}

impl RepoReference {
    pub fn parse(input: &ReferenceInput) -> Result<Self> {
        let raw = input.source.trim();
        let invalid = |reason: &str| GrabError::InvalidReference {
            input: input.source.clone(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("input is empty"));
        }

        let parts = if looks_like_url(raw) {
            parse_url(raw).map_err(|reason| invalid(&reason))?
        } else {
            parse_shorthand(raw).map_err(|reason| invalid(&reason))?
        };

        if !is_valid_name(&parts.owner) {
            return Err(invalid("owner is missing or contains invalid characters"));
        }
        if !is_valid_name(&parts.repo) {
            return Err(invalid("repository is missing or contains invalid characters"));
        }

        let sub_path = match input.path.as_deref() {
            Some(path) => {
                normalize_segments(path.split(['/', '\\'])).map_err(|reason| invalid(&reason))?
            }
            None => parts.sub_path,
        };

        let raw_ref = input
            .git_ref
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .or(parts.git_ref);

        let (git_ref, ref_kind) = match raw_ref {
            Some(raw_ref) => {
                let (name, detected) = classify_ref(&raw_ref);
                if !is_valid_ref(&name) {
                    return Err(invalid(&format!("'{}' is not a usable ref name", raw_ref)));
                }
                (Some(name), input.ref_kind.unwrap_or(detected))
            }
            None => (None, input.ref_kind.unwrap_or(RefKind::Branch)),
        };

        if git_ref.is_none() && matches!(ref_kind, RefKind::Tag | RefKind::Commit) {
            return Err(invalid("--ref-kind tag/commit needs an explicit --ref"));
        }

        Ok(Self {
            owner: parts.owner,
            repo: parts.repo,
            git_ref,
            ref_kind,
            sub_path,
        })
    }

    /// Ordered list of refs the fetcher should try.
    ///
    /// An explicit ref yields exactly one candidate; no fallback is applied.
    pub fn candidates(&self) -> Vec<RefCandidate> {
        match &self.git_ref {
            Some(name) => vec![RefCandidate {
                name: name.clone(),
                kind: self.ref_kind,
            }],
            None => FALLBACK_BRANCHES
                .iter()
                .map(|name| RefCandidate::branch(name))
                .collect(),
        }
    }

    /// "owner/repo"
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Sub-path joined with '/', empty for the repository root
    pub fn sub_path_display(&self) -> String {
        self.sub_path.join("/")
    }
}

impl fmt::Display for RepoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())?;
        if let Some(git_ref) = &self.git_ref {
            write!(f, "@{}", git_ref)?;
        }
        if !self.sub_path.is_empty() {
            write!(f, ":{}", self.sub_path_display())?;
        }
        Ok(())
    }
}

// Intermediate result of parsing the URL/shorthand before overrides
struct ParsedParts {
    owner: String,
    repo: String,
    git_ref: Option<String>,
    sub_path: Vec<String>,
}

fn looks_like_url(raw: &str) -> bool {
    raw.contains("://") || raw.starts_with("github.com/") || raw.starts_with("www.github.com/")
}

fn parse_url(raw: &str) -> std::result::Result<ParsedParts, String> {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };

    let url = Url::parse(&with_scheme).map_err(|e| format!("not a valid URL: {}", e))?;

    match url.host_str() {
        Some("github.com") | Some("www.github.com") => {}
        _ => return Err("not a GitHub URL".to_string()),
    }

    let segments: Vec<String> = url
        .path_segments()
        .map(|segs| segs.filter(|s| !s.is_empty()).map(percent_decode).collect())
        .unwrap_or_default();

    if segments.len() < 2 {
        return Err("expected https://github.com/<owner>/<repo>".to_string());
    }

    let owner = segments[0].clone();
    let repo = strip_git_suffix(&segments[1]);

    if segments.len() == 2 {
        return Ok(ParsedParts {
            owner,
            repo,
            git_ref: None,
            sub_path: Vec::new(),
        });
    }

    let is_blob = match segments[2].as_str() {
        "tree" => false,
        "blob" => true,
        other => return Err(format!("unsupported GitHub URL form '/{}/'", other)),
    };

    let git_ref = segments
        .get(3)
        .cloned()
        .ok_or_else(|| "URL names tree/blob but no ref".to_string())?;

    let mut sub_path = normalize_segments(segments[4..].iter().map(String::as_str))?;

    // A blob URL points at a file, we want the folder holding it
    if is_blob && sub_path.pop().is_none() {
        return Err("blob URL does not name a file".to_string());
    }

    Ok(ParsedParts {
        owner,
        repo,
        git_ref: Some(git_ref),
        sub_path,
    })
}

fn parse_shorthand(raw: &str) -> std::result::Result<ParsedParts, String> {
    let parts: Vec<&str> = raw.split('/').collect();

    if parts.len() < 2 {
        return Err("expected <owner>/<repo> or a GitHub URL".to_string());
    }

    Ok(ParsedParts {
        owner: parts[0].to_string(),
        repo: strip_git_suffix(parts[1]),
        git_ref: None,
        sub_path: normalize_segments(parts[2..].iter().copied())?,
    })
}

fn strip_git_suffix(repo: &str) -> String {
    repo.strip_suffix(".git").unwrap_or(repo).to_string()
}

/// Drops empty and "." segments, rejects "..".
///
/// Segments are split again on '/' and '\\' because a percent-decoded URL
/// segment (`..%2F..`) can still carry separators.
fn normalize_segments<'a, I>(segments: I) -> std::result::Result<Vec<String>, String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = Vec::new();
    for part in segments.into_iter().flat_map(|s| s.split(['/', '\\'])) {
        match part.trim() {
            "" | "." => continue,
            ".." => return Err("path may not contain '..'".to_string()),
            s => out.push(s.to_string()),
        }
    }
    Ok(out)
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn is_valid_ref(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('/')
        && !name.ends_with('/')
        && !name.contains("..")
        && !name.chars().any(|c| c.is_whitespace() || c.is_control())
}

/// Splits an optional `refs/...` or `tags/` prefix off a ref and guesses its kind.
///
/// 7 to 40 hex characters are treated as a commit SHA.
fn classify_ref(raw: &str) -> (String, RefKind) {
    if let Some(name) = raw.strip_prefix("refs/heads/") {
        return (name.to_string(), RefKind::Branch);
    }
    if let Some(name) = raw
        .strip_prefix("refs/tags/")
        .or_else(|| raw.strip_prefix("tags/"))
    {
        return (name.to_string(), RefKind::Tag);
    }
    if (7..=40).contains(&raw.len()) && raw.chars().all(|c| c.is_ascii_hexdigit()) {
        return (raw.to_ascii_lowercase(), RefKind::Commit);
    }
    (raw.to_string(), RefKind::Branch)
}

/// Decodes %XX escapes in a URL path segment
fn percent_decode(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi * 16 + lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}
