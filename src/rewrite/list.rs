//! Edit-aware view of a child list.

use crate::ast::{NodeId, Slot};

use super::{RewriteError, SyntheticId};

/// An entry of a rewritten list: an original child or an inserted node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListEntry {
    Original(NodeId),
    Inserted(SyntheticId),
}

#[derive(Debug, Clone)]
pub(crate) struct ListItem {
    pub entry: ListEntry,
    pub removed: bool,
    pub group: Option<String>,
}

/// Pending inserts and removals of one `(parent, slot)` list.
///
/// Indices passed to the insert methods are positions in the list as it will
/// look after the pending edits, see [`ListRewrite::rewritten`].
#[derive(Debug, Clone)]
pub struct ListRewrite {
    parent: NodeId,
    slot: Slot,
    pub(crate) items: Vec<ListItem>,
}

impl ListRewrite {
    pub(crate) fn new(parent: NodeId, slot: Slot, originals: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            parent,
            slot,
            items: originals
                .into_iter()
                .map(|node| ListItem {
                    entry: ListEntry::Original(node),
                    removed: false,
                    group: None,
                })
                .collect(),
        }
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// The list as it will look once the pending edits are applied.
    pub fn rewritten(&self) -> Vec<ListEntry> {
        self.items
            .iter()
            .filter(|item| !item.removed)
            .map(|item| item.entry)
            .collect()
    }

    /// The original children, untouched by pending edits.
    pub fn originals(&self) -> Vec<NodeId> {
        self.items
            .iter()
            .filter_map(|item| match item.entry {
                ListEntry::Original(node) => Some(node),
                ListEntry::Inserted(_) => None,
            })
            .collect()
    }

    pub fn is_modified(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.removed || matches!(item.entry, ListEntry::Inserted(_)))
    }

    pub fn is_removed(&self, node: NodeId) -> bool {
        self.items
            .iter()
            .any(|item| item.entry == ListEntry::Original(node) && item.removed)
    }

    /// Inserts `node` so that it ends up at `index` of the rewritten list.
    pub fn insert_at(&mut self, index: usize, node: SyntheticId, group: Option<&str>) -> Result<(), RewriteError> {
        let live = self.rewritten().len();
        if index > live {
            return Err(RewriteError::IndexOutOfRange {
                index,
                len: live,
            });
        }
        let position = if index == live {
            self.items.len()
        } else {
            self.items
                .iter()
                .enumerate()
                .filter(|(_, item)| !item.removed)
                .nth(index)
                .map(|(pos, _)| pos)
                .unwrap_or(self.items.len())
        };
        self.items.insert(
            position,
            ListItem {
                entry: ListEntry::Inserted(node),
                removed: false,
                group: group.map(str::to_string),
            },
        );
        Ok(())
    }

    pub fn insert_first(&mut self, node: SyntheticId, group: Option<&str>) {
        let position = self.items.iter().position(|item| !item.removed).unwrap_or(0);
        self.items.insert(
            position,
            ListItem {
                entry: ListEntry::Inserted(node),
                removed: false,
                group: group.map(str::to_string),
            },
        );
    }

    pub fn insert_last(&mut self, node: SyntheticId, group: Option<&str>) {
        self.items.push(ListItem {
            entry: ListEntry::Inserted(node),
            removed: false,
            group: group.map(str::to_string),
        });
    }

    /// Inserts `node` directly before `anchor`.
    pub fn insert_before(&mut self, anchor: ListEntry, node: SyntheticId, group: Option<&str>) -> Result<(), RewriteError> {
        let position = self.position(anchor)?;
        self.items.insert(
            position,
            ListItem {
                entry: ListEntry::Inserted(node),
                removed: false,
                group: group.map(str::to_string),
            },
        );
        Ok(())
    }

    /// Inserts `node` directly after `anchor`, behind anything already inserted
    /// after it.
    pub fn insert_after(&mut self, anchor: ListEntry, node: SyntheticId, group: Option<&str>) -> Result<(), RewriteError> {
        let mut position = self.position(anchor)? + 1;
        while position < self.items.len() && matches!(self.items[position].entry, ListEntry::Inserted(_)) {
            position += 1;
        }
        self.items.insert(
            position,
            ListItem {
                entry: ListEntry::Inserted(node),
                removed: false,
                group: group.map(str::to_string),
            },
        );
        Ok(())
    }

    /// Marks an entry as removed. Removing an inserted entry drops it entirely.
    pub fn remove(&mut self, entry: ListEntry, group: Option<&str>) -> Result<(), RewriteError> {
        let position = self.position(entry)?;
        match entry {
            ListEntry::Inserted(_) => {
                self.items.remove(position);
            }
            ListEntry::Original(_) => {
                let item = &mut self.items[position];
                item.removed = true;
                item.group = group.map(str::to_string);
            }
        }
        Ok(())
    }

    pub(crate) fn restore(&mut self, node: NodeId) {
        for item in &mut self.items {
            if item.entry == ListEntry::Original(node) {
                item.removed = false;
            }
        }
    }

    fn position(&self, entry: ListEntry) -> Result<usize, RewriteError> {
        self.items
            .iter()
            .position(|item| item.entry == entry)
            .ok_or(RewriteError::NotInList {
                parent: self.parent,
                slot: self.slot,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> ListRewrite {
        ListRewrite::new(NodeId::new(0), Slot::Statements, [NodeId::new(1), NodeId::new(2), NodeId::new(3)])
    }

    #[test]
    fn test_insert_index_is_relative_to_rewritten_list() {
        let mut list = list();
        list.remove(ListEntry::Original(NodeId::new(1)), None).unwrap();
        list.insert_at(1, SyntheticId(0), None).unwrap();
        assert_eq!(
            list.rewritten(),
            vec![
                ListEntry::Original(NodeId::new(2)),
                ListEntry::Inserted(SyntheticId(0)),
                ListEntry::Original(NodeId::new(3)),
            ]
        );
        assert_eq!(list.originals().len(), 3);
    }

    #[test]
    fn test_insert_after_keeps_insertion_order() {
        let mut list = list();
        let anchor = ListEntry::Original(NodeId::new(1));
        list.insert_after(anchor, SyntheticId(0), None).unwrap();
        list.insert_after(anchor, SyntheticId(1), None).unwrap();
        let rewritten = list.rewritten();
        assert_eq!(rewritten[1], ListEntry::Inserted(SyntheticId(0)));
        assert_eq!(rewritten[2], ListEntry::Inserted(SyntheticId(1)));
    }

    #[test]
    fn test_out_of_range_index() {
        let mut list = list();
        assert!(matches!(
            list.insert_at(5, SyntheticId(0), None),
            Err(RewriteError::IndexOutOfRange { index: 5, len: 3 })
        ));
    }

    #[test]
    fn test_remove_inserted_entry() {
        let mut list = list();
        list.insert_last(SyntheticId(7), None);
        assert!(list.is_modified());
        list.remove(ListEntry::Inserted(SyntheticId(7)), None).unwrap();
        assert!(!list.is_modified());
    }
}
