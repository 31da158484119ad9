//! In-progress text edit for at most one todo.

use crate::types::TodoId;

/// `Idle` or editing exactly one item.
///
/// Beginning an edit on another item replaces the current one and its draft
/// is discarded without being saved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EditBuffer {
    #[default]
    Idle,
    Editing { id: TodoId, draft: String },
}

impl EditBuffer {
    /// Enters edit mode on `id`, seeding the draft with `current_text`.
    pub fn begin(&mut self, id: TodoId, current_text: &str) {
        *self = EditBuffer::Editing {
            id,
            draft: current_text.to_string(),
        };
    }

    /// Replaces the draft. Ignored when idle.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        if let EditBuffer::Editing { draft, .. } = self {
            *draft = text.into();
        }
    }

    pub fn clear(&mut self) {
        *self = EditBuffer::Idle;
    }

    pub fn active_id(&self) -> Option<&TodoId> {
        match self {
            EditBuffer::Editing { id, .. } => Some(id),
            EditBuffer::Idle => None,
        }
    }

    pub fn draft(&self) -> Option<&str> {
        match self {
            EditBuffer::Editing { draft, .. } => Some(draft),
            EditBuffer::Idle => None,
        }
    }

    pub fn is_editing(&self, id: &TodoId) -> bool {
        self.active_id() == Some(id)
    }

    /// The active id and draft, if a commit would be allowed.
    pub fn committable(&self) -> Option<(&TodoId, &str)> {
        match self {
            EditBuffer::Editing { id, draft } if !draft.trim().is_empty() => Some((id, draft)),
            _ => None,
        }
    }
}
