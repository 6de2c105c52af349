use std::collections::VecDeque;

/// Fixed-capacity window of trial correctness with an incrementally maintained correct count.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    entries: VecDeque<bool>,
    capacity: usize,
    correct: usize,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            correct: 0,
        }
    }

    /// Appends a result, evicting the oldest when full. Returns the evicted value.
    pub fn push(&mut self, correct: bool) -> Option<bool> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        if evicted == Some(true) {
            self.correct -= 1;
        }
        self.entries.push_back(correct);
        if correct {
            self.correct += 1;
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == self.capacity
    }

    pub fn correct_count(&self) -> usize {
        self.correct
    }

    /// Accuracy over the entries currently held, 0 when empty.
    pub fn accuracy(&self) -> f64 {
        if self.entries.is_empty() {
            0.0
        } else {
            self.correct as f64 / self.entries.len() as f64
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.correct = 0;
    }
}

/// A curriculum step taken after a full window beat the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Advancement {
    pub from: usize,
    pub to: usize,
    pub accuracy: f64,
}

/// Rolling accuracy over the last `N` trials and the current curriculum position.
#[derive(Debug, Clone)]
pub struct ProgressionTracker {
    window: SlidingWindow,
    threshold: f64,
    exclude_correction: bool,
    set_count: usize,
    position: usize,
}

impl ProgressionTracker {
    pub fn new(window_size: usize, threshold: f64, exclude_correction: bool, set_count: usize) -> Self {
        Self {
            window: SlidingWindow::new(window_size),
            threshold,
            exclude_correction,
            set_count: set_count.max(1),
            position: 0,
        }
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    /// 0-based index into the curriculum.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_last_set(&self) -> bool {
        self.position + 1 >= self.set_count
    }

    /// Records one completed trial and advances the curriculum if warranted.
    ///
    /// Correction trials are skipped when excluded. Advancement needs a full window,
    /// `allow_advance`, accuracy strictly above the threshold and a next set; it clears the window.
    pub fn record(
        &mut self,
        correct: bool,
        is_correction_trial: bool,
        allow_advance: bool,
    ) -> Option<Advancement> {
        if !(self.exclude_correction && is_correction_trial) {
            self.window.push(correct);
        }
        if !allow_advance || !self.window.is_full() {
            return None;
        }
        let accuracy = self.window.correct_count() as f64 / self.window.capacity() as f64;
        if accuracy > self.threshold && !self.is_last_set() {
            let from = self.position;
            self.position += 1;
            self.window.clear();
            Some(Advancement {
                from,
                to: self.position,
                accuracy,
            })
        } else {
            None
        }
    }
}
