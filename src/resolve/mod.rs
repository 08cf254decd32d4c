// src/resolve/mod.rs
// =============================================================================
// This module finds what the user asked for inside an extracted snapshot.
//
// Submodules:
// - discover: marker-file discovery (top-level or recursive)
// - suggest: fuzzy "did you mean" for a missing path
//
// GitHub archives always hold exactly one top-level folder (`<repo>-<ref>`),
// which we call the snapshot root. Everything is resolved relative to it.
// =============================================================================

mod discover;
pub mod suggest;

use crate::error::{GrabError, Result};
use crate::github::RepoReference;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use suggest::{suggest, MAX_SUGGESTIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// Exactly the requested path
    Single,
    /// Marker folders directly under the requested path
    #[value(name = "top", alias = "top-level")]
    TopLevelOnly,
    /// Marker folders at any depth under the requested path
    Recursive,
}

impl fmt::Display for DiscoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiscoveryMode::Single => "single",
            DiscoveryMode::TopLevelOnly => "top",
            DiscoveryMode::Recursive => "recursive",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    SinglePath,
    PathList,
}

/// One resolved folder inside the snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub path: PathBuf,
    /// Relative to the snapshot root, empty for the root itself
    pub relative: PathBuf,
    /// Default output name
    pub leaf: String,
}

impl Match {
    fn new(path: PathBuf, snapshot_root: &Path, repo: &str) -> Self {
        let relative = path
            .strip_prefix(snapshot_root)
            .map(Path::to_path_buf)
            .unwrap_or_default();

        // The snapshot root is named `<repo>-<ref>`; name it after the repo
        let leaf = match relative.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => repo.to_string(),
        };

        Self {
            path,
            relative,
            leaf,
        }
    }

    /// Relative path with '/' separators, for reports
    pub fn relative_display(&self) -> String {
        let shown = self
            .relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        if shown.is_empty() {
            ".".to_string()
        } else {
            shown
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub kind: MatchKind,
    pub matches: Vec<Match>,
    /// Leaf names shared by more than one match
    pub duplicate_leaves: BTreeSet<String>,
}

impl MatchResult {
    fn new(kind: MatchKind, matches: Vec<Match>) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for m in &matches {
            *counts.entry(m.leaf.as_str()).or_insert(0) += 1;
        }
        let duplicate_leaves = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(leaf, _)| leaf.to_string())
            .collect();

        Self {
            kind,
            matches,
            duplicate_leaves,
        }
    }

    pub fn is_duplicate(&self, m: &Match) -> bool {
        self.duplicate_leaves.contains(&m.leaf)
    }
}

/// Resolves the reference's sub-path (and marker, in discovery modes)
/// against an extraction root.
pub fn resolve(
    extract_root: &Path,
    reference: &RepoReference,
    mode: DiscoveryMode,
    marker: &str,
) -> Result<MatchResult> {
    let root = snapshot_root(extract_root)?;
    let base = locate_dir(&root, &reference.sub_path)?;

    let result = match mode {
        DiscoveryMode::Single => MatchResult::new(
            MatchKind::SinglePath,
            vec![Match::new(base, &root, &reference.repo)],
        ),
        DiscoveryMode::TopLevelOnly | DiscoveryMode::Recursive => {
            let recursive = mode == DiscoveryMode::Recursive;
            let found = discover::find_marked_dirs(&base, marker, recursive)?;
            let matches = found
                .into_iter()
                .map(|path| Match::new(path, &root, &reference.repo))
                .collect();
            MatchResult::new(MatchKind::PathList, matches)
        }
    };

    debug!(
        mode = %mode,
        matches = result.matches.len(),
        duplicates = result.duplicate_leaves.len(),
        "resolved {}",
        reference
    );

    Ok(result)
}

/// The one top-level folder of an extracted GitHub archive
pub fn snapshot_root(extract_root: &Path) -> Result<PathBuf> {
    let dirs = child_dirs(extract_root)?;

    match dirs.as_slice() {
        [only] => Ok(extract_root.join(only)),
        [] => Err(GrabError::MalformedArchive {
            reason: "archive contains no top-level folder".to_string(),
        }),
        many => Err(GrabError::MalformedArchive {
            reason: format!(
                "expected one top-level folder, found {}: {}",
                many.len(),
                many.join(", ")
            ),
        }),
    }
}

// Walks the sub-path one segment at a time so that, on a miss, we know which
// folder's children to offer as suggestions
fn locate_dir(root: &Path, segments: &[String]) -> Result<PathBuf> {
    let mut current = root.to_path_buf();

    for (i, segment) in segments.iter().enumerate() {
        let next = current.join(segment);
        if next.is_dir() {
            current = next;
            continue;
        }

        let siblings = child_dirs(&current)?;
        let prefix = segments[..i].join("/");
        let suggestions = suggest(segment, &siblings, MAX_SUGGESTIONS)
            .into_iter()
            .map(|name| {
                if prefix.is_empty() {
                    name
                } else {
                    format!("{}/{}", prefix, name)
                }
            })
            .collect();

        return Err(GrabError::PathNotFound {
            path: segments.join("/"),
            suggestions,
        });
    }

    // Symlinked folders inside the snapshot are fine, anything that lands
    // outside it is not
    let real_root = root.canonicalize().map_err(|e| GrabError::io(root, e))?;
    let real = current.canonicalize().map_err(|e| GrabError::io(&current, e))?;
    if !real.starts_with(&real_root) {
        return Err(GrabError::UnsafeArchiveEntry {
            entry: segments.join("/"),
        });
    }

    Ok(current)
}

/// Sorted names of the directories directly inside `dir`
fn child_dirs(dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir).map_err(|e| GrabError::io(dir, e))?;

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();

    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::ReferenceInput;
    use std::fs;
    use tempfile::TempDir;

    fn reference(path: &str) -> RepoReference {
        RepoReference::parse(&ReferenceInput {
            source: "owner/skills".to_string(),
            path: Some(path.to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    // extract/
    //   skills-main/
    //     README.md
    //     document-skills/pdf/SKILL.md
    //     document-skills/docx/SKILL.md
    //     team-a/lint/SKILL.md
    //     team-b/lint/SKILL.md
    //     nested/x/y/deep/SKILL.md
    fn fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("skills-main");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("README.md"), "readme").unwrap();
        for dir in [
            "document-skills/pdf",
            "document-skills/docx",
            "team-a/lint",
            "team-b/lint",
            "nested/x/y/deep",
        ] {
            fs::create_dir_all(root.join(dir)).unwrap();
            fs::write(root.join(dir).join("SKILL.md"), dir).unwrap();
        }
        tmp
    }

    #[test]
    fn test_single_with_empty_path_is_snapshot_root() {
        let tmp = fixture();
        let result = resolve(tmp.path(), &reference(""), DiscoveryMode::Single, "SKILL.md").unwrap();

        assert_eq!(result.kind, MatchKind::SinglePath);
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].path, tmp.path().join("skills-main"));
        assert_eq!(result.matches[0].leaf, "skills");
        assert_eq!(result.matches[0].relative_display(), ".");
    }

    #[test]
    fn test_single_resolves_nested_path() {
        let tmp = fixture();
        let result = resolve(
            tmp.path(),
            &reference("document-skills/pdf"),
            DiscoveryMode::Single,
            "SKILL.md",
        )
        .unwrap();

        assert_eq!(result.matches[0].leaf, "pdf");
        assert_eq!(result.matches[0].relative_display(), "document-skills/pdf");
    }

    #[test]
    fn test_missing_path_carries_suggestions() {
        let tmp = fixture();
        let err = resolve(
            tmp.path(),
            &reference("document-skills/pfd"),
            DiscoveryMode::Single,
            "SKILL.md",
        )
        .unwrap_err();

        match err {
            GrabError::PathNotFound { path, suggestions } => {
                assert_eq!(path, "document-skills/pfd");
                assert_eq!(suggestions, vec!["document-skills/pdf"]);
            }
            other => panic!("expected PathNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_file_is_not_a_folder_match() {
        let tmp = fixture();
        let err = resolve(tmp.path(), &reference("README.md"), DiscoveryMode::Single, "SKILL.md")
            .unwrap_err();
        assert!(matches!(err, GrabError::PathNotFound { .. }));
    }

    #[test]
    fn test_recursive_flags_duplicate_leaves() {
        let tmp = fixture();
        let result = resolve(tmp.path(), &reference(""), DiscoveryMode::Recursive, "SKILL.md").unwrap();

        let found: Vec<String> = result.matches.iter().map(Match::relative_display).collect();
        assert_eq!(
            found,
            vec![
                "document-skills/docx",
                "document-skills/pdf",
                "nested/x/y/deep",
                "team-a/lint",
                "team-b/lint"
            ]
        );
        assert_eq!(result.kind, MatchKind::PathList);
        assert!(result.duplicate_leaves.contains("lint"));
        assert_eq!(result.duplicate_leaves.len(), 1);
        assert!(result.is_duplicate(&result.matches[3]));
        assert!(!result.is_duplicate(&result.matches[0]));
    }

    #[test]
    fn test_top_level_under_sub_path() {
        let tmp = fixture();
        let result = resolve(
            tmp.path(),
            &reference("document-skills"),
            DiscoveryMode::TopLevelOnly,
            "SKILL.md",
        )
        .unwrap();

        let leaves: Vec<&str> = result.matches.iter().map(|m| m.leaf.as_str()).collect();
        assert_eq!(leaves, vec!["docx", "pdf"]);
    }

    #[test]
    fn test_top_level_at_root_finds_nothing_nested() {
        let tmp = fixture();
        let result =
            resolve(tmp.path(), &reference(""), DiscoveryMode::TopLevelOnly, "SKILL.md").unwrap();
        assert!(result.matches.is_empty());
    }

    #[test]
    fn test_parent_segment_cannot_leave_snapshot() {
        let tmp = fixture();
        let segments = vec!["../../..".to_string()];
        let root = tmp.path().join("skills-main");

        let err = locate_dir(&root, &segments).unwrap_err();
        assert!(matches!(err, GrabError::UnsafeArchiveEntry { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_folder_outside_snapshot_is_refused() {
        let tmp = fixture();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("SECRET.txt"), "secret").unwrap();
        let root = tmp.path().join("skills-main");
        std::os::unix::fs::symlink(outside.path(), root.join("escape")).unwrap();

        let err = resolve(tmp.path(), &reference("escape"), DiscoveryMode::Single, "SKILL.md")
            .unwrap_err();

        assert!(matches!(err, GrabError::UnsafeArchiveEntry { .. }));
        assert_eq!(err.exit_code(), 4);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_folder_inside_snapshot_resolves() {
        let tmp = fixture();
        let root = tmp.path().join("skills-main");
        std::os::unix::fs::symlink(root.join("document-skills/pdf"), root.join("pdf-alias"))
            .unwrap();

        let result =
            resolve(tmp.path(), &reference("pdf-alias"), DiscoveryMode::Single, "SKILL.md").unwrap();
        assert_eq!(result.matches[0].leaf, "pdf-alias");
    }

    #[test]
    fn test_snapshot_root_must_be_unique() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            snapshot_root(tmp.path()),
            Err(GrabError::MalformedArchive { .. })
        ));

        fs::create_dir(tmp.path().join("a-main")).unwrap();
        fs::create_dir(tmp.path().join("b-main")).unwrap();
        assert!(matches!(
            snapshot_root(tmp.path()),
            Err(GrabError::MalformedArchive { .. })
        ));
    }
}
