//! Derived view state: computed from the store on demand, never stored.

use crate::edit::EditBuffer;
use crate::store::TodoStore;
use crate::types::{TodoId, TodoItem};

/// Number of items not yet completed.
pub fn remaining_count(items: &[TodoItem]) -> usize {
    items.iter().filter(|item| !item.is_complete).count()
}

/// `"{n} Todos remaining"`.
pub fn summary_line(items: &[TodoItem]) -> String {
    format!("{} Todos remaining", remaining_count(items))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStyle {
    Open,
    /// Rendered struck through and dimmed.
    Completed,
}

/// One rendered row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView<'a> {
    /// 1-based display position.
    pub position: usize,
    pub id: &'a TodoId,
    pub text: &'a str,
    pub style: ItemStyle,
    /// The draft, when this row is the one being edited.
    pub draft: Option<&'a str>,
}

impl RowView<'_> {
    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }
}

pub fn rows<'a>(store: &'a TodoStore, edit: &'a EditBuffer) -> Vec<RowView<'a>> {
    store
        .iter()
        .enumerate()
        .map(|(i, item)| RowView {
            position: i + 1,
            id: &item.id,
            text: &item.text,
            style: if item.is_complete {
                ItemStyle::Completed
            } else {
                ItemStyle::Open
            },
            draft: edit
                .is_editing(&item.id)
                .then(|| edit.draft())
                .flatten(),
        })
        .collect()
}
