use std::collections::HashSet;

/// Identity of one pressed contact: the primary mouse button or a touch finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactId {
    Mouse,
    Finger(u64),
}

/// Contacts currently held down. Membership decides whether the screen is fully released.
#[derive(Debug, Clone, Default)]
pub struct ContactSet {
    active: HashSet<ContactId>,
}

impl ContactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the contact was already held.
    pub fn press(&mut self, id: ContactId) -> bool {
        self.active.insert(id)
    }

    pub fn release(&mut self, id: ContactId) -> bool {
        self.active.remove(&id)
    }

    pub fn is_clear(&self) -> bool {
        self.active.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn contains(&self, id: ContactId) -> bool {
        self.active.contains(&id)
    }

    /// Drops every held contact and returns how many were held.
    pub fn clear(&mut self) -> usize {
        let held = self.active.len();
        self.active.clear();
        held
    }
}
