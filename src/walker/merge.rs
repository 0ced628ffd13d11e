//! Merge-join of two sorted directory listings

use crate::fs::types::DirEntryRef;
use std::cmp::Ordering;
use std::ffi::OsString;
use std::os::unix::ffi::OsStrExt;

/// A name that survived the merge and needs a visit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedName {
    pub name: OsString,

    /// Listed in the left directory
    pub on_left: bool,

    /// Listed in the right directory
    pub on_right: bool,
}

/// Outcome of merging one directory level
#[derive(Debug, Default)]
pub struct MergeResult {
    /// Names to descend into, in name order
    pub names: Vec<MergedName>,

    /// Names skipped because both sides share the same inode
    pub pruned: usize,
}

/// Walk two name-sorted listings in lock-step
///
/// A name on both sides with the same inode is pruned when
/// `same_device` holds (the two parent directories live on one
/// filesystem, so equal inode numbers mean the same file).
pub fn merge_listings(
    left: &[DirEntryRef],
    right: &[DirEntryRef],
    same_device: bool,
) -> MergeResult {
    let mut result = MergeResult {
        names: Vec::with_capacity(left.len().max(right.len())),
        pruned: 0,
    };

    let (mut l, mut r) = (0, 0);
    while l < left.len() && r < right.len() {
        let (a, b) = (&left[l], &right[r]);
        match a.name.as_bytes().cmp(b.name.as_bytes()) {
            Ordering::Less => {
                result.names.push(only(a, true));
                l += 1;
            }
            Ordering::Greater => {
                result.names.push(only(b, false));
                r += 1;
            }
            Ordering::Equal => {
                if same_device && a.inode == b.inode {
                    result.pruned += 1;
                } else {
                    result.names.push(MergedName {
                        name: a.name.clone(),
                        on_left: true,
                        on_right: true,
                    });
                }
                l += 1;
                r += 1;
            }
        }
    }

    result.names.extend(left[l..].iter().map(|e| only(e, true)));
    result.names.extend(right[r..].iter().map(|e| only(e, false)));
    result
}

fn only(entry: &DirEntryRef, left: bool) -> MergedName {
    MergedName {
        name: entry.name.clone(),
        on_left: left,
        on_right: !left,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(entries: &[(&str, u64)]) -> Vec<DirEntryRef> {
        entries.iter().map(|(n, i)| DirEntryRef::new(*n, *i)).collect()
    }

    fn summary(result: &MergeResult) -> Vec<(String, bool, bool)> {
        result
            .names
            .iter()
            .map(|m| (m.name.to_string_lossy().into_owned(), m.on_left, m.on_right))
            .collect()
    }

    #[test]
    fn test_three_way_merge() {
        let left = listing(&[("a", 1), ("b", 2), ("d", 4), ("e", 5)]);
        let right = listing(&[("b", 2), ("c", 3), ("d", 40), ("f", 6)]);

        let result = merge_listings(&left, &right, true);
        assert_eq!(result.pruned, 1);
        assert_eq!(
            summary(&result),
            vec![
                ("a".into(), true, false),
                ("c".into(), false, true),
                ("d".into(), true, true),
                ("e".into(), true, false),
                ("f".into(), false, true),
            ]
        );
    }

    #[test]
    fn test_no_pruning_across_devices() {
        let left = listing(&[("same", 7)]);
        let right = listing(&[("same", 7)]);

        let result = merge_listings(&left, &right, false);
        assert_eq!(result.pruned, 0);
        assert_eq!(summary(&result), vec![("same".into(), true, true)]);
    }

    #[test]
    fn test_one_side_empty() {
        let left = listing(&[("x", 1), ("y", 2)]);
        let result = merge_listings(&left, &[], true);
        assert_eq!(summary(&result), vec![("x".into(), true, false), ("y".into(), true, false)]);

        let result = merge_listings(&[], &left, true);
        assert_eq!(summary(&result), vec![("x".into(), false, true), ("y".into(), false, true)]);

        assert!(merge_listings(&[], &[], true).names.is_empty());
    }

    #[test]
    fn test_identical_listings_fully_pruned() {
        let side = listing(&[("bin", 10), ("etc", 11), ("usr", 12)]);
        let result = merge_listings(&side, &side, true);
        assert!(result.names.is_empty());
        assert_eq!(result.pruned, 3);
    }
}
