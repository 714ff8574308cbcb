//! Rebuilds the monitoring hierarchy from flat, unordered parent/child records.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

use tracing::debug;

use crate::models::{TreeNode, TreeRecord};

/// How records with `pid == 0` are placed at the top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootInsertion {
    /// Roots are only inserted during the first pass and are not deduplicated.
    FirstPassOnly,
    /// Roots are inserted whenever they are seen, at most once per id.
    #[default]
    Idempotent,
}

/// Assembles `records` into a forest with every sibling list ordered by name.
///
/// Records whose parent is not yet in the tree are retried on a following
/// pass until a pass makes no progress; records still pending then are
/// orphans and are dropped.
pub fn normalize_tree(records: &[TreeRecord], roots: RootInsertion) -> Vec<TreeNode> {
    let mut tree: Vec<TreeNode> = Vec::new();
    let mut pending: Vec<TreeRecord> = records.to_vec();
    let mut previous: Option<Vec<TreeRecord>> = None;
    let mut pass = 0usize;

    loop {
        let mut retry = Vec::new();

        for record in pending {
            if record.pid == 0 {
                match roots {
                    RootInsertion::FirstPassOnly if pass == 0 => {
                        insert_sorted(&mut tree, record.into());
                    }
                    RootInsertion::FirstPassOnly => {}
                    RootInsertion::Idempotent => {
                        insert_unique(&mut tree, record.into());
                    }
                }
                continue;
            }

            match find_node_mut(&mut tree, record.pid) {
                Some(parent) => {
                    let children = parent.children.get_or_insert_with(Vec::new);
                    insert_unique(children, record.into());
                }
                None => retry.push(record),
            }
        }

        pass += 1;
        if retry.is_empty() {
            break;
        }
        if previous.as_ref() == Some(&retry) {
            debug!(orphans = retry.len(), passes = pass, "dropping tree records without parent");
            break;
        }
        previous = Some(retry.clone());
        pending = retry;
    }

    tree
}

/// Flattens a forest back into records, parents before children.
pub fn flatten_tree(tree: &[TreeNode]) -> Vec<TreeRecord> {
    let mut records = Vec::new();
    let mut stack: Vec<&TreeNode> = tree.iter().rev().collect();
    while let Some(node) = stack.pop() {
        records.push(node.record.clone());
        if let Some(children) = &node.children {
            stack.extend(children.iter().rev());
        }
    }
    records
}

/// Depth-first search for the node with `id`.
pub fn find_node_mut(nodes: &mut [TreeNode], id: i64) -> Option<&mut TreeNode> {
    for node in nodes.iter_mut() {
        if node.record.id == id {
            return Some(node);
        }
        if let Some(children) = node.children.as_mut() {
            if let Some(found) = find_node_mut(children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn insert_unique(siblings: &mut Vec<TreeNode>, node: TreeNode) {
    if siblings.iter().any(|sibling| sibling.id() == node.id()) {
        return;
    }
    insert_sorted(siblings, node);
}

/// Inserts after any sibling that compares equal, so equal names keep arrival order.
fn insert_sorted(siblings: &mut Vec<TreeNode>, node: TreeNode) {
    let index = siblings
        .partition_point(|sibling| compare_names(sibling.name(), node.name()) != Ordering::Greater);
    siblings.insert(index, node);
}

/// Case-insensitive comparison that orders digit runs by numeric value,
/// so `node2` sorts before `node10`.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ordering = compare_numbers(&take_digits(&mut left), &take_digits(&mut right));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                let ordering = l.to_lowercase().cmp(r.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
        digits.push(c);
    }
    digits
}

fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(id: i64, pid: i64, name: &str) -> TreeRecord {
        TreeRecord {
            id,
            pid,
            name: name.to_string(),
            path: name.to_string(),
            node_type: None,
            leaf: None,
            cate: None,
            icon_color: None,
            icon_char: None,
        }
    }

    fn names(nodes: &[TreeNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name()).collect()
    }

    fn count(nodes: &[TreeNode]) -> usize {
        nodes
            .iter()
            .map(|n| 1 + n.children.as_deref().map(count).unwrap_or(0))
            .sum()
    }

    #[test]
    fn test_parent_after_child() {
        let records = vec![record(2, 1, "b"), record(1, 0, "a"), record(3, 1, "a-child")];
        let tree = normalize_tree(&records, RootInsertion::Idempotent);

        assert_eq!(names(&tree), vec!["a"]);
        assert_eq!(tree[0].id(), 1);
        let children = tree[0].children.as_deref().unwrap();
        assert_eq!(names(children), vec!["a-child", "b"]);
        assert!(children.iter().all(|c| c.children.is_none()));
    }

    #[test]
    fn test_reverse_ordered_deep_chain() {
        let records = vec![
            record(5, 4, "e"),
            record(4, 3, "d"),
            record(3, 2, "c"),
            record(2, 1, "b"),
            record(1, 0, "a"),
        ];
        let tree = normalize_tree(&records, RootInsertion::Idempotent);
        assert_eq!(count(&tree), records.len());

        let mut node = &tree[0];
        for expected in ["b", "c", "d", "e"] {
            node = &node.children.as_deref().unwrap()[0];
            assert_eq!(node.name(), expected);
        }
    }

    #[test]
    fn test_numeric_aware_sibling_order() {
        let records = vec![
            record(1, 0, "root"),
            record(10, 1, "node10"),
            record(2, 1, "node2"),
            record(3, 1, "Node1"),
        ];
        let tree = normalize_tree(&records, RootInsertion::Idempotent);
        assert_eq!(
            names(tree[0].children.as_deref().unwrap()),
            vec!["Node1", "node2", "node10"]
        );
    }

    #[test]
    fn test_roots_sorted() {
        let records = vec![record(2, 0, "ops"), record(1, 0, "db"), record(3, 0, "biz")];
        let tree = normalize_tree(&records, RootInsertion::FirstPassOnly);
        assert_eq!(names(&tree), vec!["biz", "db", "ops"]);
    }

    #[test]
    fn test_orphans_are_dropped() {
        let records = vec![record(1, 0, "a"), record(2, 1, "b"), record(9, 42, "orphan")];
        let tree = normalize_tree(&records, RootInsertion::Idempotent);
        assert_eq!(count(&tree), 2);
    }

    #[test]
    fn test_duplicate_child_inserted_once() {
        let records = vec![record(1, 0, "a"), record(2, 1, "b"), record(2, 1, "b")];
        let tree = normalize_tree(&records, RootInsertion::Idempotent);
        assert_eq!(tree[0].children.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_duplicate_roots_per_policy() {
        let records = vec![record(1, 0, "a"), record(1, 0, "a")];
        assert_eq!(normalize_tree(&records, RootInsertion::FirstPassOnly).len(), 2);
        assert_eq!(normalize_tree(&records, RootInsertion::Idempotent).len(), 1);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let records = vec![
            record(7, 3, "web10"),
            record(6, 3, "web2"),
            record(3, 1, "web"),
            record(4, 1, "db"),
            record(1, 0, "prod"),
            record(2, 0, "dev"),
            record(8, 2, "sandbox"),
        ];
        let first = normalize_tree(&records, RootInsertion::Idempotent);
        let second = normalize_tree(&flatten_tree(&first), RootInsertion::Idempotent);
        assert_eq!(first, second);
        assert_eq!(count(&first), records.len());
    }

    #[test]
    fn test_equal_names_keep_arrival_order() {
        let records = vec![
            record(1, 0, "root"),
            record(2, 1, "Web"),
            record(3, 1, "web"),
            record(4, 1, "host007"),
            record(5, 1, "host7"),
            record(6, 1, "web"),
        ];
        let first = normalize_tree(&records, RootInsertion::Idempotent);
        let ids: Vec<i64> = first[0]
            .children
            .as_deref()
            .unwrap()
            .iter()
            .map(TreeNode::id)
            .collect();
        assert_eq!(ids, vec![4, 5, 2, 3, 6]);

        let second = normalize_tree(&flatten_tree(&first), RootInsertion::Idempotent);
        assert_eq!(first, second);
    }

    #[test]
    fn test_input_is_not_modified() {
        let records = vec![record(2, 1, "b"), record(1, 0, "a")];
        let snapshot = records.clone();
        let _ = normalize_tree(&records, RootInsertion::Idempotent);
        assert_eq!(records, snapshot);
    }

    #[test]
    fn test_compare_names() {
        assert_eq!(compare_names("node2", "node10"), Ordering::Less);
        assert_eq!(compare_names("a", "B"), Ordering::Less);
        assert_eq!(compare_names("Web", "web"), Ordering::Equal);
        assert_eq!(compare_names("a", "a-child"), Ordering::Less);
        assert_eq!(compare_names("host007", "host7"), Ordering::Equal);
        assert_eq!(compare_names("x9y", "x10a"), Ordering::Less);
    }
}
