use homecage_core::{ContactId, Point};
use std::collections::VecDeque;

/// Gameplay input: a contact going down (with its position, when known) or up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactEvent {
    Down {
        contact: ContactId,
        point: Option<Point>,
    },
    Up {
        contact: ContactId,
    },
}

impl ContactEvent {
    pub fn contact(&self) -> ContactId {
        match *self {
            ContactEvent::Down { contact, .. } | ContactEvent::Up { contact } => contact,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Quit,
    Contact(ContactEvent),
}

/// Bounded buffer between the input source and the controller.
///
/// Quit is a sticky flag and never waits behind contact events. When full, the oldest
/// contact event is discarded and counted.
#[derive(Debug)]
pub struct InputQueue {
    pending: VecDeque<ContactEvent>,
    capacity: usize,
    quit: bool,
    dropped: u64,
}

impl InputQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            pending: VecDeque::with_capacity(capacity),
            capacity,
            quit: false,
            dropped: 0,
        }
    }

    pub fn push(&mut self, event: InputEvent) {
        match event {
            InputEvent::Quit => self.quit = true,
            InputEvent::Contact(contact) => {
                if self.pending.len() == self.capacity {
                    self.pending.pop_front();
                    self.dropped += 1;
                }
                self.pending.push_back(contact);
            }
        }
    }

    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    /// Returns and resets the number of events dropped since the last call.
    pub fn take_dropped(&mut self) -> u64 {
        std::mem::take(&mut self.dropped)
    }

    pub fn pop(&mut self) -> Option<ContactEvent> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Extend<InputEvent> for InputQueue {
    fn extend<I: IntoIterator<Item = InputEvent>>(&mut self, iter: I) {
        for event in iter {
            self.push(event);
        }
    }
}
