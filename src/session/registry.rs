//! Accepted plate registry

use std::collections::HashSet;

use crate::recognition::ValidatedPlate;

/// De-duplicated plates in first-seen order. Entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct ResultRegistry {
    plates: Vec<ValidatedPlate>,
    seen: HashSet<ValidatedPlate>,
}

impl ResultRegistry {
    /// Insert a plate; returns `false` if it was already present
    pub fn insert(&mut self, plate: ValidatedPlate) -> bool {
        if self.seen.contains(&plate) {
            return false;
        }
        self.seen.insert(plate.clone());
        self.plates.push(plate);
        true
    }

    pub fn len(&self) -> usize {
        self.plates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plates.is_empty()
    }

    /// Newline-joined listing for display
    pub fn display_text(&self) -> String {
        self.plates
            .iter()
            .map(ValidatedPlate::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
