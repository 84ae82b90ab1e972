use std::collections::VecDeque;

/// A turn that was drawn, with the exact rows it occupied at the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShownTurn {
    pub index: usize,
    pub rows: usize,
}

/// Partition of rendered turns into what is on screen and what was hidden.
///
/// `displayed` has the newest entry at the back, `hidden` has the most
/// recently hidden entry at the front. Both hold at most `max_displayed`.
#[derive(Debug, Clone)]
pub struct VisibleHistory {
    displayed: VecDeque<ShownTurn>,
    hidden: VecDeque<ShownTurn>,
    max_displayed: usize,
}

impl VisibleHistory {
    pub fn new(max_displayed: usize) -> Self {
        Self {
            displayed: VecDeque::new(),
            hidden: VecDeque::new(),
            max_displayed: max_displayed.max(1),
        }
    }

    /// Returns the entry evicted to keep `displayed` within bounds.
    pub fn record_shown(&mut self, shown: ShownTurn) -> Option<ShownTurn> {
        self.displayed.push_back(shown);
        if self.displayed.len() > self.max_displayed {
            return self.displayed.pop_front();
        }
        None
    }

    /// Moves the newest displayed entry to the front of `hidden`. The caller
    /// erases `rows` rows from the terminal.
    pub fn hide_last(&mut self) -> Option<ShownTurn> {
        let shown = self.displayed.pop_back()?;
        self.hidden.push_front(shown);
        if self.hidden.len() > self.max_displayed {
            self.hidden.pop_back();
        }
        Some(shown)
    }

    /// Takes the most recently hidden entry so it can be drawn again.
    pub fn take_hidden(&mut self) -> Option<ShownTurn> {
        self.hidden.pop_front()
    }

    /// Puts back an entry taken with [`VisibleHistory::take_hidden`] that
    /// could not be drawn.
    pub fn restore_hidden(&mut self, shown: ShownTurn) {
        self.hidden.push_front(shown);
    }

    pub fn last_displayed(&self) -> Option<&ShownTurn> {
        self.displayed.back()
    }

    /// Drops the newest displayed entry without keeping it in `hidden`.
    pub fn pop_displayed(&mut self) -> Option<ShownTurn> {
        self.displayed.pop_back()
    }

    pub fn clear(&mut self) {
        self.displayed.clear();
        self.hidden.clear();
    }

    pub fn displayed(&self) -> impl Iterator<Item = &ShownTurn> {
        self.displayed.iter()
    }

    pub fn hidden(&self) -> impl Iterator<Item = &ShownTurn> {
        self.hidden.iter()
    }

    pub fn displayed_len(&self) -> usize {
        self.displayed.len()
    }

    pub fn hidden_len(&self) -> usize {
        self.hidden.len()
    }

    pub fn has_hidden(&self) -> bool {
        !self.hidden.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{ShownTurn, VisibleHistory};

    fn shown(index: usize) -> ShownTurn {
        ShownTurn {
            index,
            rows: index + 2,
        }
    }

    fn displayed_indices(history: &VisibleHistory) -> Vec<usize> {
        history.displayed().map(|entry| entry.index).collect()
    }

    #[test]
    fn displayed_is_bounded_and_evicts_oldest() {
        let mut history = VisibleHistory::new(3);
        for index in 0..3 {
            assert_eq!(history.record_shown(shown(index)), None);
        }
        assert_eq!(history.record_shown(shown(3)), Some(shown(0)));
        assert_eq!(displayed_indices(&history), vec![1, 2, 3]);
        assert_eq!(history.hidden_len(), 0);
        for index in 4..40 {
            history.record_shown(shown(index));
            assert!(history.displayed_len() <= 3);
        }
    }

    #[test]
    fn hide_then_reveal_restores_display_order() {
        let mut history = VisibleHistory::new(50);
        for index in [4, 7, 9] {
            history.record_shown(shown(index));
        }
        assert_eq!(history.hide_last(), Some(shown(9)));
        assert_eq!(history.hide_last(), Some(shown(7)));
        assert_eq!(displayed_indices(&history), vec![4]);
        assert_eq!(
            history.hidden().map(|entry| entry.index).collect::<Vec<_>>(),
            vec![7, 9]
        );

        while let Some(entry) = history.take_hidden() {
            history.record_shown(entry);
        }
        assert_eq!(displayed_indices(&history), vec![4, 7, 9]);
        assert!(!history.has_hidden());
    }

    #[test]
    fn hiding_from_empty_and_clearing_are_safe() {
        let mut history = VisibleHistory::new(2);
        assert_eq!(history.hide_last(), None);
        history.record_shown(shown(1));
        history.hide_last();
        history.record_shown(shown(2));
        assert_eq!(history.pop_displayed(), Some(shown(2)));
        history.clear();
        assert_eq!(history.displayed_len(), 0);
        assert_eq!(history.hidden_len(), 0);
    }
}
