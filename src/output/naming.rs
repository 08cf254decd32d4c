// src/output/naming.rs
// =============================================================================
// Output names and collision handling.
//
// Two separate steps, in this order:
// 1. Disambiguation: matches sharing a leaf name (team-a/lint, team-b/lint)
//    get the shortest trailing run of path components that tells them apart
//    (team-a-lint, team-b-lint)
// 2. Collision policy: what to do when the chosen name already exists in the
//    destination folder
// =============================================================================

use crate::error::{GrabError, Result};
use crate::resolve::MatchResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Replace whatever is already there
    Overwrite,
    /// Keep the old copy, add -YYYYMMDD-HHMMSS (and -1, -2... if needed)
    #[default]
    #[value(name = "timestamp")]
    TimestampSuffix,
    /// Fail without copying anything
    Abort,
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollisionPolicy::Overwrite => "overwrite",
            CollisionPolicy::TimestampSuffix => "timestamp",
            CollisionPolicy::Abort => "abort",
        };
        f.write_str(name)
    }
}

/// One output name per match, in match order.
///
/// Names are unique within the run: a qualified duplicate that happens to
/// equal another match's plain leaf (`team-a/lint` vs `x/team-a-lint`) is
/// qualified further, and a numeric suffix is the last resort.
pub fn output_names(result: &MatchResult) -> Vec<String> {
    let components: Vec<Vec<String>> = result
        .matches
        .iter()
        .map(|m| {
            m.relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .collect();

    let names: Vec<String> = result
        .matches
        .iter()
        .enumerate()
        .map(|(i, m)| {
            if !result.is_duplicate(m) {
                return m.leaf.clone();
            }

            let group: Vec<&Vec<String>> = result
                .matches
                .iter()
                .enumerate()
                .filter(|(j, other)| *j != i && other.leaf == m.leaf)
                .map(|(j, _)| &components[j])
                .collect();

            qualify(&components[i], &group)
        })
        .collect();

    make_unique(names, &components)
}

// Shortest trailing run (at least leaf + parent) that no other group member shares
fn qualify(own: &[String], others: &[&Vec<String>]) -> String {
    for k in 2..=own.len() {
        let name = trailing(own, k);
        if others.iter().all(|other| trailing(other, k) != name) {
            return name;
        }
    }
    own.join("-")
}

// The first match keeps a contested name; later ones take a longer trailing
// run, then `-1`, `-2`... Candidates never steal a name a later match owns.
fn make_unique(mut names: Vec<String>, components: &[Vec<String>]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();

    for i in 0..names.len() {
        if used.contains(&names[i]) {
            let free = |candidate: &String| {
                !used.contains(candidate) && !names[i + 1..].contains(candidate)
            };

            let longer = (2..=components[i].len())
                .map(|k| trailing(&components[i], k))
                .find(|candidate| free(candidate));

            let renamed = match longer {
                Some(name) => name,
                None => (1..)
                    .map(|n| format!("{}-{}", names[i], n))
                    .find(|candidate| free(candidate))
                    .unwrap_or_default(),
            };
            names[i] = renamed;
        }
        used.insert(names[i].clone());
    }

    names
}

fn trailing(components: &[String], k: usize) -> String {
    components[components.len().saturating_sub(k)..].join("-")
}

/// Paths that belong to one output: the folder and its optional siblings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub dir: PathBuf,
    pub archive: PathBuf,
    pub sidecar: PathBuf,
}

impl OutputPaths {
    pub fn for_name(dest_root: &Path, name: &str) -> Self {
        Self {
            dir: dest_root.join(name),
            archive: dest_root.join(format!("{}.tar.gz", name)),
            sidecar: dest_root.join(format!("{}.source.json", name)),
        }
    }

    fn taken(&self, with_archive: bool, with_sidecar: bool) -> bool {
        self.dir.exists()
            || (with_archive && self.archive.exists())
            || (with_sidecar && self.sidecar.exists())
    }

    fn remove_existing(&self) -> Result<()> {
        if self.dir.is_dir() {
            std::fs::remove_dir_all(&self.dir).map_err(|e| GrabError::io(&self.dir, e))?;
        } else if self.dir.exists() {
            std::fs::remove_file(&self.dir).map_err(|e| GrabError::io(&self.dir, e))?;
        }
        for file in [&self.archive, &self.sidecar] {
            if file.is_file() {
                std::fs::remove_file(file).map_err(|e| GrabError::io(file, e))?;
            }
        }
        Ok(())
    }
}

/// Picks the final paths for `name` under `dest_root` according to `policy`.
///
/// `stamp` is the run's `YYYYMMDD-HHMMSS` timestamp. Under `Overwrite` the
/// existing output is removed before returning.
pub fn claim_destination(
    dest_root: &Path,
    name: &str,
    policy: CollisionPolicy,
    stamp: &str,
    with_archive: bool,
    with_sidecar: bool,
) -> Result<OutputPaths> {
    let wanted = OutputPaths::for_name(dest_root, name);
    if !wanted.taken(with_archive, with_sidecar) {
        return Ok(wanted);
    }

    match policy {
        CollisionPolicy::Abort => Err(GrabError::DestinationExists { path: wanted.dir }),
        CollisionPolicy::Overwrite => {
            wanted.remove_existing()?;
            Ok(wanted)
        }
        CollisionPolicy::TimestampSuffix => {
            let stamped = format!("{}-{}", name, stamp);
            let mut paths = OutputPaths::for_name(dest_root, &stamped);
            let mut counter = 1;
            // same second, same name: fall back to a counter
            while paths.taken(with_archive, with_sidecar) {
                paths = OutputPaths::for_name(dest_root, &format!("{}-{}", stamped, counter));
                counter += 1;
            }
            Ok(paths)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::{Match, MatchKind};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn result_for(paths: &[&str]) -> MatchResult {
        let matches: Vec<Match> = paths
            .iter()
            .map(|p| Match {
                path: PathBuf::from("/snap").join(p),
                relative: PathBuf::from(p),
                leaf: p.rsplit('/').next().unwrap().to_string(),
            })
            .collect();
        let mut seen = BTreeSet::new();
        let mut duplicate_leaves = BTreeSet::new();
        for m in &matches {
            if !seen.insert(m.leaf.clone()) {
                duplicate_leaves.insert(m.leaf.clone());
            }
        }
        MatchResult {
            kind: MatchKind::PathList,
            matches,
            duplicate_leaves,
        }
    }

    #[test]
    fn test_unique_leaves_keep_their_name() {
        let result = result_for(&["skills/pdf", "skills/docx"]);
        assert_eq!(output_names(&result), vec!["pdf", "docx"]);
    }

    #[test]
    fn test_duplicates_get_parent_prefix() {
        let result = result_for(&["team-a/lint", "team-b/lint", "other/fmt"]);
        assert_eq!(
            output_names(&result),
            vec!["team-a-lint", "team-b-lint", "fmt"]
        );
    }

    #[test]
    fn test_duplicates_with_same_parent_go_deeper() {
        let result = result_for(&["x/common/lint", "y/common/lint"]);
        assert_eq!(output_names(&result), vec!["x-common-lint", "y-common-lint"]);
    }

    #[test]
    fn test_qualified_name_never_matches_another_leaf() {
        let result = result_for(&["team-a/lint", "team-b/lint", "x/team-a-lint"]);
        assert_eq!(
            output_names(&result),
            vec!["team-a-lint", "team-b-lint", "x-team-a-lint"]
        );
    }

    #[test]
    fn test_numeric_suffix_when_no_longer_run_exists() {
        let result = result_for(&["team-a-lint", "team-a/lint", "team-b/lint"]);
        let names = output_names(&result);

        assert_eq!(names, vec!["team-a-lint", "team-a-lint-1", "team-b-lint"]);
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_free_name_is_used_as_is() {
        let tmp = TempDir::new().unwrap();
        let paths = claim_destination(
            tmp.path(),
            "pdf",
            CollisionPolicy::Abort,
            "20260101-000000",
            false,
            false,
        )
        .unwrap();
        assert_eq!(paths.dir, tmp.path().join("pdf"));
    }

    #[test]
    fn test_abort_refuses_existing() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("pdf")).unwrap();

        let err = claim_destination(
            tmp.path(),
            "pdf",
            CollisionPolicy::Abort,
            "20260101-000000",
            false,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, GrabError::DestinationExists { .. }));
        assert!(tmp.path().join("pdf").is_dir());
    }

    #[test]
    fn test_timestamp_suffix_never_reuses_a_name() {
        let tmp = TempDir::new().unwrap();
        let stamp = "20260101-120000";
        std::fs::create_dir(tmp.path().join("pdf")).unwrap();

        let first =
            claim_destination(tmp.path(), "pdf", CollisionPolicy::TimestampSuffix, stamp, false, false)
                .unwrap();
        assert_eq!(first.dir, tmp.path().join("pdf-20260101-120000"));
        std::fs::create_dir(&first.dir).unwrap();

        // Same second again
        let second =
            claim_destination(tmp.path(), "pdf", CollisionPolicy::TimestampSuffix, stamp, false, false)
                .unwrap();
        assert_eq!(second.dir, tmp.path().join("pdf-20260101-120000-1"));
    }

    #[test]
    fn test_overwrite_clears_old_output_and_siblings() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("pdf")).unwrap();
        std::fs::write(tmp.path().join("pdf/old.txt"), "old").unwrap();
        std::fs::write(tmp.path().join("pdf.tar.gz"), "old").unwrap();

        let paths = claim_destination(
            tmp.path(),
            "pdf",
            CollisionPolicy::Overwrite,
            "20260101-000000",
            true,
            false,
        )
        .unwrap();

        assert_eq!(paths.dir, tmp.path().join("pdf"));
        assert!(!paths.dir.exists());
        assert!(!paths.archive.exists());
    }

    #[test]
    fn test_leftover_archive_counts_as_taken() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("pdf.tar.gz"), "old").unwrap();

        let paths = claim_destination(
            tmp.path(),
            "pdf",
            CollisionPolicy::TimestampSuffix,
            "20260101-000000",
            true,
            false,
        )
        .unwrap();
        assert_eq!(paths.dir, tmp.path().join("pdf-20260101-000000"));
    }
}
