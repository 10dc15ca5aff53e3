//! The partial patch an agent hands back to the orchestrator.

use serde::{Deserialize, Serialize};

use crate::{Message, SummarySlot};

/// Assignment of a value to one summary slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub slot: SummarySlot,
    pub value: String,
}

/// A partial patch to the trip state produced by one stage.
///
/// Carries zero or more messages, which are always appended to the log, and
/// at most one slot assignment. Whether the assignment is allowed is decided
/// by [`crate::TripState::apply`], not here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    messages: Vec<Message>,
    assignment: Option<SlotAssignment>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message to the patch.
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Sets the slot assignment. A second call replaces the first; an update
    /// never carries more than one.
    pub fn with_summary(mut self, slot: SummarySlot, value: impl Into<String>) -> Self {
        self.assignment = Some(SlotAssignment {
            slot,
            value: value.into(),
        });
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn assignment(&self) -> Option<&SlotAssignment> {
        self.assignment.as_ref()
    }

    /// Returns `true` if applying the update would change nothing.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.assignment.is_none()
    }

    pub(crate) fn into_parts(self) -> (Vec<Message>, Option<SlotAssignment>) {
        (self.messages, self.assignment)
    }
}
