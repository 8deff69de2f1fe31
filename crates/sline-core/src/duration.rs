//! # Duration Selection
//!
//! Tracks the instalment count the shopper picked, or the default one when
//! they have not picked any.

use crate::error::{SlineError, SlineResult};

/// Currently chosen duration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DurationSelector {
    selected: Option<u32>,
    explicit: bool,
}

impl DurationSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a shopper's choice, validated against the known durations
    pub fn set_selected(&mut self, duration: u32, available: &[u32]) -> SlineResult<()> {
        if !available.contains(&duration) {
            return Err(SlineError::UnknownDuration {
                duration,
                available: available.to_vec(),
            });
        }
        self.selected = Some(duration);
        self.explicit = true;
        Ok(())
    }

    /// Reconcile with the durations of a freshly applied response.
    ///
    /// Without an explicit choice the longest plan is selected. An explicit
    /// choice that is no longer offered is dropped in favour of that default.
    pub fn on_durations(&mut self, available: &[u32]) {
        if self.explicit {
            if let Some(selected) = self.selected {
                if available.contains(&selected) {
                    return;
                }
                tracing::warn!(
                    selected,
                    ?available,
                    "selected duration no longer offered, falling back to default"
                );
            }
        }
        self.selected = available.iter().copied().max();
        self.explicit = false;
    }

    /// The selection, only if it is one of `available`
    pub fn selected(&self, available: &[u32]) -> Option<u32> {
        self.selected.filter(|d| available.contains(d))
    }

    /// The raw selection, valid or not
    pub fn raw(&self) -> Option<u32> {
        self.selected
    }

    /// Whether the current selection came from the shopper
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    pub fn clear(&mut self) {
        self.selected = None;
        self.explicit = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_longest_plan() {
        let mut selector = DurationSelector::new();
        selector.on_durations(&[3, 6, 12]);
        assert_eq!(selector.selected(&[3, 6, 12]), Some(12));
        assert!(!selector.is_explicit());
    }

    #[test]
    fn test_explicit_choice_survives_refetch() {
        let mut selector = DurationSelector::new();
        selector.on_durations(&[3, 6, 12]);
        selector.set_selected(6, &[3, 6, 12]).unwrap();
        selector.on_durations(&[3, 6, 12, 24]);
        assert_eq!(selector.raw(), Some(6));
        assert!(selector.is_explicit());
    }

    #[test]
    fn test_explicit_choice_dropped_when_not_offered() {
        let mut selector = DurationSelector::new();
        selector.set_selected(6, &[3, 6]).unwrap();
        selector.on_durations(&[3, 10]);
        assert_eq!(selector.raw(), Some(10));
        assert!(!selector.is_explicit());
    }

    #[test]
    fn test_unknown_duration() {
        let mut selector = DurationSelector::new();
        let err = selector.set_selected(4, &[3, 6]).unwrap_err();
        assert_eq!(
            err,
            SlineError::UnknownDuration {
                duration: 4,
                available: vec![3, 6]
            }
        );
        assert!(selector.set_selected(3, &[]).is_err());
        assert_eq!(selector.raw(), None);
    }

    #[test]
    fn test_selected_is_filtered_by_availability() {
        let mut selector = DurationSelector::new();
        selector.on_durations(&[3, 12]);
        assert_eq!(selector.selected(&[3, 6]), None);
    }

    #[test]
    fn test_empty_durations_clear_default() {
        let mut selector = DurationSelector::new();
        selector.on_durations(&[3, 12]);
        selector.on_durations(&[]);
        assert_eq!(selector.raw(), None);
    }
}
