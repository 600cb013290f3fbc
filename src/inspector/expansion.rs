//! Accordion expansion of service groups

/// At most one service group is open at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpansionState {
    expanded: Option<usize>,
}

impl ExpansionState {
    /// Handles a click on `group`: collapses it if open, otherwise opens it
    /// and closes every other group. Returns whether `group` is now open.
    pub fn toggle(&mut self, group: usize, group_count: usize) -> bool {
        if group >= group_count {
            return false;
        }
        if self.expanded == Some(group) {
            self.expanded = None;
            false
        } else {
            self.expanded = Some(group);
            true
        }
    }

    pub fn is_expanded(&self, group: usize) -> bool {
        self.expanded == Some(group)
    }

    pub fn collapse_all(&mut self) {
        self.expanded = None;
    }

    /// Drops an expansion that points past the end after the list shrank
    pub fn clamp(&mut self, group_count: usize) {
        if self.expanded.is_some_and(|g| g >= group_count) {
            self.expanded = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clicking_twice_collapses() {
        let mut state = ExpansionState::default();
        assert!(state.toggle(1, 3));
        assert!(state.is_expanded(1));
        assert!(!state.toggle(1, 3));
        assert_eq!(state, ExpansionState::default());
    }

    #[test]
    fn opening_a_group_closes_the_others() {
        let mut state = ExpansionState::default();
        state.toggle(0, 3);
        state.toggle(2, 3);
        assert!(!state.is_expanded(0));
        assert!(state.is_expanded(2));
    }

    #[test]
    fn at_most_one_group_open_after_any_click_sequence() {
        let group_count = 5;
        let mut state = ExpansionState::default();
        // Deterministic pseudo random click sequence, including out of range clicks
        let mut seed: u32 = 0x2545_F491;
        for _ in 0..1000 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let group = (seed % 7) as usize;
            state.toggle(group, group_count);

            let open = (0..group_count).filter(|g| state.is_expanded(*g)).count();
            assert!(open <= 1);
        }
    }

    #[test]
    fn out_of_range_clicks_are_ignored_and_clamped() {
        let mut state = ExpansionState::default();
        assert!(!state.toggle(4, 2));
        assert_eq!(state, ExpansionState::default());

        state.toggle(3, 4);
        state.clamp(2);
        assert_eq!(state, ExpansionState::default());
    }
}
