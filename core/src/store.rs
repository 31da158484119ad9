//! Local snapshot of the user's todos.
//!
//! The store only changes through the reconciliation methods below, which the
//! sync engine calls with server-confirmed payloads. Order is insertion order;
//! each id appears at most once.

use std::collections::HashSet;

use tracing::warn;

use crate::types::{TodoId, TodoItem};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoStore {
    items: Vec<TodoItem>,
}

impl TodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole sequence. Later duplicates of an id are dropped.
    pub fn replace_all(&mut self, items: Vec<TodoItem>) {
        let mut seen = HashSet::with_capacity(items.len());
        self.items = items
            .into_iter()
            .filter(|item| {
                let fresh = seen.insert(item.id.clone());
                if !fresh {
                    warn!(id = %item.id, "dropping duplicate todo from fetch");
                }
                fresh
            })
            .collect();
    }

    /// Adds `item` at the end, or replaces the entry that already has its id.
    pub fn append(&mut self, item: TodoItem) {
        if let Some(pos) = self.position(&item.id) {
            warn!(id = %item.id, "created todo already present, replacing in place");
            self.items[pos] = item;
            return;
        }
        self.items.push(item);
    }

    /// Swaps in `item` where `id` sits. Returns whether anything changed.
    ///
    /// If `item` carries a different id that is already stored elsewhere,
    /// that other entry is dropped so each id stays unique.
    pub fn replace_one(&mut self, id: &TodoId, item: TodoItem) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        if item.id != *id {
            if let Some(other) = self.position(&item.id) {
                warn!(id = %id, replacement = %item.id, "replacement id already present, dropping the older entry");
                self.items.remove(other);
                let pos = if other < pos { pos - 1 } else { pos };
                self.items[pos] = item;
                return true;
            }
        }
        self.items[pos] = item;
        true
    }

    /// Removes the entry for `id`. Returns whether it was present.
    pub fn remove_one(&mut self, id: &TodoId) -> bool {
        match self.position(id) {
            Some(pos) => {
                self.items.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &TodoId) -> Option<&TodoItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn position(&self, id: &TodoId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }

    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TodoItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn remaining_count(&self) -> usize {
        crate::view::remaining_count(&self.items)
    }
}
