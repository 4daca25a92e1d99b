//! Transient client-side UI state. Nothing here is ever written to the store.

use crate::{
    forms::PendingWrite,
    models::{Collection, RecordId},
};

/// Which single list item is expanded to show its details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Expansion {
    /// No item is expanded.
    #[default]
    NoneSelected,
    /// The item with this id is expanded.
    Selected(RecordId),
}

impl Expansion {
    /// Toggle `id`: tapping the expanded item collapses it, tapping any
    /// other item expands that one instead.
    pub fn tap(&mut self, id: &RecordId) {
        *self = match &*self {
            Self::Selected(current) if current == id => Self::NoneSelected,
            _ => Self::Selected(id.clone()),
        };
    }

    /// Collapse whatever is expanded (tap outside the list).
    pub fn clear(&mut self) {
        *self = Self::NoneSelected;
    }

    /// Whether `id` is the expanded item.
    pub fn is_expanded(&self, id: &RecordId) -> bool {
        matches!(self, Self::Selected(current) if current == id)
    }

    /// Expanded item, if any.
    pub fn selected(&self) -> Option<&RecordId> {
        match self {
            Self::Selected(id) => Some(id),
            Self::NoneSelected => None,
        }
    }

    /// Collapse when the expanded item is missing from the latest snapshot.
    pub fn retain<'a>(&mut self, mut present: impl Iterator<Item = &'a RecordId>) {
        if let Self::Selected(current) = &*self {
            if !present.any(|id| id == current) {
                *self = Self::NoneSelected;
            }
        }
    }
}

/// Value chosen on a selection sub-screen, waiting to be merged into the
/// form that opened it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChoice<T> {
    value: Option<T>,
}

impl<T> Default for PendingChoice<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T> PendingChoice<T> {
    /// Record the sub-screen's choice, replacing any earlier one.
    pub fn offer(&mut self, value: T) {
        self.value = Some(value);
    }

    /// Drain the choice on return to the owning form.
    pub fn take(&mut self) -> Option<T> {
        self.value.take()
    }

    /// Whether a choice is waiting.
    pub fn is_pending(&self) -> bool {
        self.value.is_some()
    }

    /// Forget any choice (navigation away from the owning screen).
    pub fn reset(&mut self) {
        self.value = None;
    }
}

/// Answer to a delete confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Go ahead and delete.
    Confirm,
    /// Keep the record.
    Cancel,
}

/// A delete waiting for the user's confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletePrompt {
    collection: Collection,
    id: RecordId,
    label: String,
}

impl DeletePrompt {
    /// Ask before deleting `id` from `collection`; `label` names it to the user.
    pub fn new(collection: Collection, id: RecordId, label: impl Into<String>) -> Self {
        Self {
            collection,
            id,
            label: label.into(),
        }
    }

    /// Collection the record lives in.
    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Record awaiting deletion.
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Display name of the record.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Resolve the prompt. Only confirmation produces a write.
    pub fn resolve(self, decision: Decision) -> Option<PendingWrite> {
        match decision {
            Decision::Confirm => Some(PendingWrite::Delete {
                collection: self.collection,
                id: self.id,
            }),
            Decision::Cancel => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tapping_same_item_twice_collapses() {
        let a = RecordId::from("a");
        let mut expansion = Expansion::default();
        expansion.tap(&a);
        assert_eq!(expansion, Expansion::Selected(a.clone()));
        expansion.tap(&a);
        assert_eq!(expansion, Expansion::NoneSelected);
    }

    #[test]
    fn tapping_other_item_moves_selection() {
        let a = RecordId::from("a");
        let b = RecordId::from("b");
        let mut expansion = Expansion::default();
        expansion.tap(&a);
        expansion.tap(&b);
        assert_eq!(expansion, Expansion::Selected(b.clone()));
        assert!(expansion.is_expanded(&b));
        assert!(!expansion.is_expanded(&a));
    }

    #[test]
    fn retain_collapses_removed_items() {
        let a = RecordId::from("a");
        let b = RecordId::from("b");
        let mut expansion = Expansion::Selected(a.clone());
        expansion.retain([a.clone(), b.clone()].iter());
        assert!(expansion.is_expanded(&a));
        expansion.retain([b].iter());
        assert_eq!(expansion, Expansion::NoneSelected);
    }

    #[test]
    fn pending_choice_is_drained_once() {
        let mut choice = PendingChoice::default();
        choice.offer("PC".to_string());
        choice.offer("Switch".to_string());
        assert!(choice.is_pending());
        assert_eq!(choice.take().as_deref(), Some("Switch"));
        assert_eq!(choice.take(), None);

        choice.offer("PC".to_string());
        choice.reset();
        assert!(!choice.is_pending());
    }

    #[test]
    fn only_confirmed_prompts_write() {
        let prompt = DeletePrompt::new(Collection::Games, RecordId::from("g1"), "Chess");
        assert_eq!(prompt.label(), "Chess");
        assert!(prompt.clone().resolve(Decision::Cancel).is_none());
        assert_eq!(
            prompt.resolve(Decision::Confirm),
            Some(PendingWrite::Delete {
                collection: Collection::Games,
                id: RecordId::from("g1"),
            })
        );
    }
}
