//! Roster — participants in join order.
//!
//! DESIGN
//! ======
//! Join indices come from a monotonic counter. Removing a participant never
//! renumbers the others and its index is never handed out again, so a
//! departure can leave a hole that pauses sequencing for the index chain
//! behind it.

use uuid::Uuid;

use super::EngineError;
use super::participant::{Participant, ParticipantView, Profile};

#[derive(Debug, Clone, Default)]
pub struct Roster {
    participants: Vec<Participant>,
    next_index: u32,
}

impl Roster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new participant and return its join index.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateParticipant` if `id` is already present.
    pub fn add(&mut self, id: Uuid, profile: Profile) -> Result<u32, EngineError> {
        if self.contains(id) {
            return Err(EngineError::DuplicateParticipant(id));
        }
        let join_index = self.next_index;
        self.next_index += 1;
        self.participants.push(Participant::new(id, join_index, profile));
        Ok(join_index)
    }

    /// # Errors
    ///
    /// Returns `NotFound` if no participant has this id.
    pub fn find_by_id(&self, id: Uuid) -> Result<&Participant, EngineError> {
        self.participants
            .iter()
            .find(|p| p.id() == id)
            .ok_or(EngineError::NotFound(id))
    }

    #[must_use]
    pub fn find_by_index(&self, join_index: u32) -> Option<&Participant> {
        self.participants.iter().find(|p| p.join_index() == join_index)
    }

    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.participants.iter().any(|p| p.id() == id)
    }

    /// Remove a participant and hand it back.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no participant has this id.
    pub fn remove(&mut self, id: Uuid) -> Result<Participant, EngineError> {
        let pos = self
            .participants
            .iter()
            .position(|p| p.id() == id)
            .ok_or(EngineError::NotFound(id))?;
        Ok(self.participants.remove(pos))
    }

    /// Current participants in join order. The iterator is `Clone`, so a
    /// caller can restart the walk without touching the roster again.
    pub fn all(&self) -> std::slice::Iter<'_, Participant> {
        self.participants.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// The join index the next participant will receive.
    #[must_use]
    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<ParticipantView> {
        self.participants.iter().map(Participant::view).collect()
    }

    /// Swap in an updated copy of an existing participant.
    pub(super) fn replace(&mut self, updated: Participant) -> Result<(), EngineError> {
        let slot = self
            .participants
            .iter_mut()
            .find(|p| p.id() == updated.id())
            .ok_or(EngineError::NotFound(updated.id()))?;
        *slot = updated;
        Ok(())
    }

    pub(super) fn clear(&mut self) {
        self.participants.clear();
        self.next_index = 0;
    }
}

#[cfg(test)]
#[path = "roster_test.rs"]
mod tests;
