//! Flat-list to forest assembly.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::{LinkOptions, MenuNode, MenuRecord, OrphanPolicy};

/// Deepest nesting kept in a forest; a root is at depth 1.
pub const MAX_DEPTH: usize = 64;

/// Options controlling how a forest is assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForestOptions {
    /// Handling of records whose parent cannot be found.
    pub orphan_policy: OrphanPolicy,
    /// Link resolution for every node.
    pub links: LinkOptions,
}

/// Assemble a flat list of records into an ordered forest.
///
/// Children are attached to the record named by their `parent_id`; siblings
/// at every level are sorted by ascending `sort_order`, keeping input order
/// on ties. Records that reference a missing parent are handled per
/// `options.orphan_policy`. Records caught in a parent cycle can never be
/// reached from a root and are left out.
///
/// When several records share an id, the last one wins and the earlier ones
/// are ignored. Entries nested deeper than [`MAX_DEPTH`] are left out along
/// with their descendants.
#[must_use]
pub fn build_forest(records: Vec<MenuRecord>, options: &ForestOptions) -> Vec<MenuNode> {
    let total = records.len();

    let mut position_of: HashMap<i64, usize> = HashMap::with_capacity(total);
    for (pos, record) in records.iter().enumerate() {
        if position_of.insert(record.id, pos).is_some() {
            warn!(id = record.id, "duplicate menu id, keeping the later record");
        }
    }

    // Parent position -> child positions, in input order.
    let mut children_of: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut roots: Vec<usize> = Vec::new();
    let mut orphans = 0usize;

    for (pos, record) in records.iter().enumerate() {
        if position_of.get(&record.id) != Some(&pos) {
            continue;
        }
        match record.parent_id {
            None => roots.push(pos),
            Some(parent_id) => match position_of.get(&parent_id) {
                Some(&parent_pos) => children_of.entry(parent_pos).or_default().push(pos),
                None => {
                    orphans += 1;
                    match options.orphan_policy {
                        OrphanPolicy::Drop => {
                            debug!(id = record.id, parent_id, "dropping orphaned menu record");
                        }
                        OrphanPolicy::PromoteToRoot => roots.push(pos),
                    }
                }
            },
        }
    }

    let by_rank = |positions: &mut Vec<usize>| {
        // `sort_by_key` is stable, so ties keep input order.
        positions.sort_by_key(|&pos| records[pos].sort_order);
    };
    by_rank(&mut roots);
    for positions in children_of.values_mut() {
        by_rank(positions);
    }

    let mut slots: Vec<Option<MenuRecord>> = records.into_iter().map(Some).collect();
    let mut too_deep = 0usize;
    let forest: Vec<MenuNode> = roots
        .iter()
        .filter_map(|&pos| {
            assemble(pos, &mut slots, &children_of, &options.links, &mut too_deep)
        })
        .collect();
    if too_deep > 0 {
        warn!(
            too_deep,
            max_depth = MAX_DEPTH,
            "menu nested too deeply, leaving out the deepest entries"
        );
    }

    let placed: usize = forest.iter().map(MenuNode::subtree_size).sum();
    if placed < total {
        debug!(
            total,
            placed, orphans, "some menu records were not placed in the forest"
        );
    }
    forest
}

/// A node under construction and the next of its children to visit.
struct Frame {
    node: MenuNode,
    pos: usize,
    next_child: usize,
}

/// Build the node at `root` and all of its descendants, depth first.
///
/// Uses an explicit stack; children deeper than [`MAX_DEPTH`] are left out.
fn assemble(
    root: usize,
    slots: &mut [Option<MenuRecord>],
    children_of: &HashMap<usize, Vec<usize>>,
    links: &LinkOptions,
    too_deep: &mut usize,
) -> Option<MenuNode> {
    let record = slots[root].take()?;
    let mut stack = vec![Frame {
        node: MenuNode::new(record, links),
        pos: root,
        next_child: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let children = children_of.get(&frame.pos).map_or(&[][..], Vec::as_slice);
        if let Some(&child) = children.get(frame.next_child) {
            frame.next_child += 1;
            if stack.len() >= MAX_DEPTH {
                *too_deep += 1;
                continue;
            }
            if let Some(record) = slots[child].take() {
                stack.push(Frame {
                    node: MenuNode::new(record, links),
                    pos: child,
                    next_child: 0,
                });
            }
            continue;
        }

        let finished = stack.pop()?;
        match stack.last_mut() {
            Some(parent) => parent.node.children.push(finished.node),
            None => return Some(finished.node),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(nodes: &[MenuNode]) -> Vec<i64> {
        nodes.iter().map(MenuNode::id).collect()
    }

    fn contains_id(nodes: &[MenuNode], id: i64) -> bool {
        nodes
            .iter()
            .any(|n| n.id() == id || contains_id(&n.children, id))
    }

    fn build(records: Vec<MenuRecord>) -> Vec<MenuNode> {
        build_forest(records, &ForestOptions::default())
    }

    #[test]
    fn test_empty_input_gives_empty_forest() {
        assert!(build(Vec::new()).is_empty());
    }

    #[test]
    fn test_children_match_parent_references() {
        let records = vec![
            MenuRecord::new(1, "Events").with_sort_order(1),
            MenuRecord::new(2, "Venues").with_sort_order(0),
            MenuRecord::new(3, "Calendar").with_parent(1).with_sort_order(2),
            MenuRecord::new(4, "Past events").with_parent(1).with_sort_order(1),
            MenuRecord::new(5, "Ratings").with_parent(2),
            MenuRecord::new(6, "Top rated").with_parent(5),
        ];

        let forest = build(records);

        assert_eq!(ids(&forest), vec![2, 1]);
        let venues = &forest[0];
        assert_eq!(ids(&venues.children), vec![5]);
        assert_eq!(ids(&venues.children[0].children), vec![6]);
        let events = &forest[1];
        assert_eq!(ids(&events.children), vec![4, 3]);
        assert!(events.children.iter().all(|c| c.children.is_empty()));
    }

    #[test]
    fn test_children_listed_before_parent() {
        let records = vec![
            MenuRecord::new(10, "Child").with_parent(20),
            MenuRecord::new(20, "Parent"),
        ];

        let forest = build(records);
        assert_eq!(ids(&forest), vec![20]);
        assert_eq!(ids(&forest[0].children), vec![10]);
    }

    #[test]
    fn test_stable_order_for_equal_ranks() {
        let records = vec![
            MenuRecord::new(100, "Root"),
            MenuRecord::new(1, "A").with_parent(100).with_sort_order(1),
            MenuRecord::new(2, "B").with_parent(100).with_sort_order(1),
            MenuRecord::new(3, "C").with_parent(100).with_sort_order(0),
        ];

        let forest = build(records);
        let names: Vec<&str> = forest[0].children.iter().map(MenuNode::name).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_stable_order_for_equal_root_ranks() {
        let records = vec![
            MenuRecord::new(1, "A").with_sort_order(5),
            MenuRecord::new(2, "B").with_sort_order(5),
            MenuRecord::new(3, "C").with_sort_order(-1),
        ];
        assert_eq!(ids(&build(records)), vec![3, 1, 2]);
    }

    #[test]
    fn test_orphan_dropped_with_descendants() {
        let records = vec![
            MenuRecord::new(1, "Home"),
            MenuRecord::new(2, "Lost").with_parent(99),
            MenuRecord::new(3, "Lost child").with_parent(2),
        ];

        let forest = build(records);
        assert_eq!(ids(&forest), vec![1]);
        assert!(!contains_id(&forest, 2));
        assert!(!contains_id(&forest, 3));
    }

    #[test]
    fn test_orphan_promoted_when_configured() {
        let records = vec![
            MenuRecord::new(1, "Home").with_sort_order(1),
            MenuRecord::new(2, "Lost").with_parent(99).with_sort_order(0),
            MenuRecord::new(3, "Lost child").with_parent(2),
        ];
        let options = ForestOptions {
            orphan_policy: OrphanPolicy::PromoteToRoot,
            ..ForestOptions::default()
        };

        let forest = build_forest(records, &options);
        assert_eq!(ids(&forest), vec![2, 1]);
        assert_eq!(ids(&forest[0].children), vec![3]);
    }

    #[test]
    fn test_cycle_is_unreachable() {
        let records = vec![
            MenuRecord::new(1, "Home"),
            MenuRecord::new(2, "Loop A").with_parent(3),
            MenuRecord::new(3, "Loop B").with_parent(2),
            MenuRecord::new(4, "Self").with_parent(4),
        ];

        let forest = build(records);
        assert_eq!(ids(&forest), vec![1]);
        assert_eq!(forest[0].subtree_size(), 1);
    }

    #[test]
    fn test_duplicate_id_keeps_later_record() {
        let records = vec![
            MenuRecord::new(1, "Old name"),
            MenuRecord::new(1, "New name"),
            MenuRecord::new(2, "Child").with_parent(1),
        ];

        let forest = build(records);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].name(), "New name");
        assert_eq!(ids(&forest[0].children), vec![2]);
    }

    #[test]
    fn test_depth_field_is_ignored() {
        let mut child = MenuRecord::new(2, "Child").with_parent(1);
        child.depth = 7;
        let mut root = MenuRecord::new(1, "Root");
        root.depth = 3;

        let forest = build(vec![child, root]);
        assert_eq!(ids(&forest), vec![1]);
        assert_eq!(forest[0].children[0].record.depth, 7);
    }

    fn chain(len: i64) -> Vec<MenuRecord> {
        (0..len)
            .map(|i| {
                let record = MenuRecord::new(i, format!("Level {i}"));
                if i == 0 {
                    record
                } else {
                    record.with_parent(i - 1)
                }
            })
            .collect()
    }

    fn depth(node: &MenuNode) -> usize {
        let mut depth = 1;
        let mut current = node;
        while let Some(child) = current.children.first() {
            depth += 1;
            current = child;
        }
        depth
    }

    #[test]
    fn test_deep_chain_is_capped() {
        let forest = build(chain(50_000));

        assert_eq!(ids(&forest), vec![0]);
        assert_eq!(depth(&forest[0]), MAX_DEPTH);
        assert_eq!(forest[0].subtree_size(), MAX_DEPTH);
    }

    #[test]
    fn test_chain_at_max_depth_is_kept_whole() {
        let len = i64::try_from(MAX_DEPTH).unwrap();
        let forest = build(chain(len));

        assert_eq!(forest[0].subtree_size(), MAX_DEPTH);
        assert!(contains_id(&forest, len - 1));
    }

    #[test]
    fn test_depth_cap_keeps_shallow_siblings() {
        let mut records = chain(200);
        records.push(MenuRecord::new(1_000, "Sibling").with_parent(0).with_sort_order(1));

        let forest = build(records);
        let root = &forest[0];
        assert_eq!(ids(&root.children), vec![1, 1_000]);
        assert_eq!(depth(root), MAX_DEPTH);
    }

    #[test]
    fn test_resolved_links_use_options() {
        let options = ForestOptions {
            links: LinkOptions {
                page_path_prefix: "/p/".to_string(),
                placeholder_href: "#".to_string(),
            },
            ..ForestOptions::default()
        };
        let records = vec![
            MenuRecord::new(1, "About").with_page(5, "About", "about"),
            MenuRecord::new(2, "Join").with_href("/join").with_parent(1),
        ];

        let forest = build_forest(records, &options);
        assert_eq!(forest[0].resolved_href, "/p/about");
        assert_eq!(forest[0].children[0].resolved_href, "/join");
    }
}
