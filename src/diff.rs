//! File-list diff engine: compares two `Files` object snapshots and reports
//! which files were added, deleted, renamed, copied, or simply changed
//! (`spec.md` §4.H).
//!
//! Grounded on the `file_pool`/`diff_betwen_reports` pattern from the
//! original `cov` tool's `repository.cc`: build a lookup keyed by the old
//! path, consume it while walking the new entries (consulting rename hints
//! from the companion Git layer first), then whatever is left unconsumed was
//! deleted.

use std::collections::HashMap;

use crate::gitlink::RenameHint;
use crate::internal::codec::files::{Files, FilesEntry};
use crate::internal::codec::CoverageStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Added,
    Deleted,
    Renamed,
    Copied,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: String,
    pub previous_name: Option<String>,
    pub diff_kind: DiffKind,
    pub current: Option<CoverageStats>,
    pub previous: Option<CoverageStats>,
}

fn stats_of(entry: &FilesEntry) -> CoverageStats {
    CoverageStats {
        lines_total: entry.lines_total,
        lines: entry.lines,
        functions: entry.functions,
        branches: entry.branches,
    }
}

/// Compare `old` against `new`, folding in same-content rename/copy hints
/// from the host Git layer. Output is stably sorted by the new (or, for
/// deletions, the old) path.
pub fn diff_files(old: &Files, new: &Files, renames: &[RenameHint]) -> Vec<FileDiff> {
    let mut pool: HashMap<&str, (&FilesEntry, bool)> = old
        .entries
        .iter()
        .map(|e| (e.path.as_str(), (e, false)))
        .collect();

    let rename_by_new_path: HashMap<&str, &RenameHint> = renames
        .iter()
        .map(|hint| (hint.new_path.as_str(), hint))
        .collect();

    let mut out = Vec::with_capacity(new.entries.len());

    for entry in &new.entries {
        if let Some(hint) = rename_by_new_path.get(entry.path.as_str()) {
            if let Some((old_entry, used)) = pool.get_mut(hint.old_path.as_str()) {
                let was_used = *used;
                *used = true;
                out.push(FileDiff {
                    path: entry.path.clone(),
                    previous_name: Some(hint.old_path.clone()),
                    diff_kind: if was_used {
                        DiffKind::Copied
                    } else {
                        DiffKind::Renamed
                    },
                    current: Some(stats_of(entry)),
                    previous: Some(stats_of(old_entry)),
                });
                continue;
            }
        }

        if let Some((old_entry, used)) = pool.get_mut(entry.path.as_str()) {
            *used = true;
            out.push(FileDiff {
                path: entry.path.clone(),
                previous_name: None,
                diff_kind: DiffKind::Normal,
                current: Some(stats_of(entry)),
                previous: Some(stats_of(old_entry)),
            });
            continue;
        }

        out.push(FileDiff {
            path: entry.path.clone(),
            previous_name: None,
            diff_kind: DiffKind::Added,
            current: Some(stats_of(entry)),
            previous: None,
        });
    }

    for old_entry in &old.entries {
        let (_, used) = pool[old_entry.path.as_str()];
        if !used {
            out.push(FileDiff {
                path: old_entry.path.clone(),
                previous_name: None,
                diff_kind: DiffKind::Deleted,
                current: None,
                previous: Some(stats_of(old_entry)),
            });
        }
    }

    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

/// A `Files` object diffed against an empty baseline: every entry is
/// `Added`. Used for the root report of a history, or whenever
/// `diff_with_parent` has no parent to compare against (`spec.md` §4.H).
pub fn diff_against_empty(new: &Files) -> Vec<FileDiff> {
    diff_files(&Files::default(), new, &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Oid;
    use crate::internal::codec::{Pair, UNINITIALISED};

    fn entry(path: &str, visited: u32) -> FilesEntry {
        FilesEntry {
            path: path.to_string(),
            contents_oid: Oid::of(path.as_bytes()),
            line_coverage_oid: Oid::of(b"lines"),
            lines_total: 100,
            lines: Pair {
                relevant: 100,
                visited,
            },
            function_coverage_oid: None,
            branch_coverage_oid: None,
            functions: UNINITIALISED,
            branches: UNINITIALISED,
        }
    }

    #[test]
    fn unchanged_path_is_normal() {
        let old = Files::new(vec![entry("a.cc", 50)]);
        let new = Files::new(vec![entry("a.cc", 60)]);
        let diff = diff_files(&old, &new, &[]);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].diff_kind, DiffKind::Normal);
        assert_eq!(diff[0].current.unwrap().lines.visited, 60);
        assert_eq!(diff[0].previous.unwrap().lines.visited, 50);
    }

    #[test]
    fn new_path_is_added() {
        let old = Files::new(vec![]);
        let new = Files::new(vec![entry("a.cc", 10)]);
        let diff = diff_files(&old, &new, &[]);
        assert_eq!(diff[0].diff_kind, DiffKind::Added);
        assert!(diff[0].previous.is_none());
    }

    #[test]
    fn missing_path_is_deleted() {
        let old = Files::new(vec![entry("a.cc", 10)]);
        let new = Files::new(vec![]);
        let diff = diff_files(&old, &new, &[]);
        assert_eq!(diff[0].diff_kind, DiffKind::Deleted);
        assert!(diff[0].current.is_none());
    }

    #[test]
    fn rename_hint_pairs_old_and_new_path() {
        let old = Files::new(vec![entry("old.cc", 40)]);
        let new = Files::new(vec![entry("new.cc", 45)]);
        let hints = vec![RenameHint {
            old_path: "old.cc".to_string(),
            new_path: "new.cc".to_string(),
            similarity_percent: 95,
        }];
        let diff = diff_files(&old, &new, &hints);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].diff_kind, DiffKind::Renamed);
        assert_eq!(diff[0].previous_name.as_deref(), Some("old.cc"));
    }

    #[test]
    fn second_rename_from_same_source_is_copied() {
        let old = Files::new(vec![entry("old.cc", 40)]);
        let new = Files::new(vec![entry("copy1.cc", 40), entry("copy2.cc", 40)]);
        let hints = vec![
            RenameHint {
                old_path: "old.cc".to_string(),
                new_path: "copy1.cc".to_string(),
                similarity_percent: 100,
            },
            RenameHint {
                old_path: "old.cc".to_string(),
                new_path: "copy2.cc".to_string(),
                similarity_percent: 100,
            },
        ];
        let diff = diff_files(&old, &new, &hints);
        let kinds: Vec<_> = diff.iter().map(|d| d.diff_kind).collect();
        assert!(kinds.contains(&DiffKind::Renamed));
        assert!(kinds.contains(&DiffKind::Copied));
    }

    #[test]
    fn diff_against_empty_marks_everything_added() {
        let new = Files::new(vec![entry("a.cc", 1), entry("b.cc", 2)]);
        let diff = diff_against_empty(&new);
        assert!(diff.iter().all(|d| d.diff_kind == DiffKind::Added));
    }

    #[test]
    fn rename_map_wins_over_a_same_named_old_entry() {
        // `b.cc` is reused: the old `b.cc` content actually moved to `c.cc`,
        // while a different file was renamed from `a.cc` into the now-vacant
        // `b.cc` path. The rename map must be consulted before the same-path
        // match, or `b.cc` gets paired with the wrong old entry and `a.cc`'s
        // true rename is reported as a deletion instead.
        let old = Files::new(vec![entry("a.cc", 10), entry("b.cc", 20)]);
        let new = Files::new(vec![entry("b.cc", 10), entry("c.cc", 20)]);
        let hints = vec![
            RenameHint {
                old_path: "a.cc".to_string(),
                new_path: "b.cc".to_string(),
                similarity_percent: 100,
            },
            RenameHint {
                old_path: "b.cc".to_string(),
                new_path: "c.cc".to_string(),
                similarity_percent: 100,
            },
        ];
        let diff = diff_files(&old, &new, &hints);

        let b = diff.iter().find(|d| d.path == "b.cc").unwrap();
        assert_eq!(b.diff_kind, DiffKind::Renamed);
        assert_eq!(b.previous_name.as_deref(), Some("a.cc"));

        let c = diff.iter().find(|d| d.path == "c.cc").unwrap();
        assert_eq!(c.diff_kind, DiffKind::Renamed);
        assert_eq!(c.previous_name.as_deref(), Some("b.cc"));

        assert!(!diff.iter().any(|d| d.diff_kind == DiffKind::Deleted));
    }

    #[test]
    fn results_sorted_by_path() {
        let old = Files::new(vec![entry("z.cc", 1)]);
        let new = Files::new(vec![entry("a.cc", 1), entry("m.cc", 1)]);
        let diff = diff_files(&old, &new, &[]);
        let paths: Vec<_> = diff.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["a.cc", "m.cc", "z.cc"]);
    }
}
