use super::Transition;

/// Maps the wizard's step index, plus the transition in flight, to the step
/// the progress indicator should show (`0..=total_steps`).
///
/// While an exit is in flight the step index is 0, so the pending transition
/// decides what the bar shows.
pub fn map_step(step_index: u8, pending: Option<Transition>, total_steps: u8) -> u8 {
    match step_index {
        0 => match pending {
            Some(Transition::AdvanceToStepThree) => total_steps.saturating_sub(1),
            Some(Transition::ReturnToStepTwo | Transition::AdvanceToStepFour) => total_steps,
            _ => step_index.saturating_sub(1),
        },
        // nothing is complete while the source text is still being entered
        1 => 0,
        i if i <= total_steps => i,
        i if i == total_steps + 1 => total_steps,
        _ => 0,
    }
}

/// The bar itself: fill level and caption for an already mapped step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressBar {
    current: u8,
    total: u8,
}

impl ProgressBar {
    pub fn new(current: u8, total: u8) -> Self {
        Self { current, total }
    }

    /// Steps completed, as shown in the caption.
    pub fn completed(&self) -> u8 {
        match self.current {
            0 | 1 => 0,
            c if c == self.total + 1 => self.total,
            c => c - 1,
        }
    }

    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        match self.current {
            0 | 1 => 5,
            c if c == self.total + 1 => 100,
            c => {
                let pct = u32::from(c - 1) * 100 / u32::from(self.total);
                pct.min(100) as u8
            }
        }
    }

    pub fn label(&self) -> String {
        format!("Step {} of {}", self.completed(), self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOTAL: u8 = 3;

    const ALL_PENDING: [Option<Transition>; 6] = [
        None,
        Some(Transition::EnterReview),
        Some(Transition::ReturnToStepTwo),
        Some(Transition::AdvanceToStepThree),
        Some(Transition::AdvanceToStepFour),
        Some(Transition::Restart),
    ];

    #[test]
    fn documented_points() {
        assert_eq!(map_step(1, None, TOTAL), 0);
        assert_eq!(map_step(2, None, TOTAL), 2);
        assert_eq!(
            map_step(0, Some(Transition::AdvanceToStepThree), TOTAL),
            TOTAL - 1
        );
        assert_eq!(map_step(TOTAL + 1, None, TOTAL), TOTAL);
    }

    #[test]
    fn exhaustive_table() {
        for pending in ALL_PENDING {
            for step in 0..=TOTAL + 2 {
                let expected = match (step, pending) {
                    (0, Some(Transition::AdvanceToStepThree)) => 2,
                    (0, Some(Transition::ReturnToStepTwo)) => 3,
                    (0, Some(Transition::AdvanceToStepFour)) => 3,
                    (0, _) => 0,
                    (1, _) => 0,
                    (2, _) => 2,
                    (3, _) => 3,
                    (4, _) => 3,
                    _ => 0,
                };
                assert_eq!(
                    map_step(step, pending, TOTAL),
                    expected,
                    "step {step}, pending {pending:?}"
                );
            }
        }
    }

    #[test]
    fn never_exceeds_total() {
        for pending in ALL_PENDING {
            for step in 0..=u8::MAX - 1 {
                assert!(map_step(step, pending, TOTAL) <= TOTAL);
            }
        }
    }

    #[test]
    fn bar_fill_and_caption() {
        assert_eq!(ProgressBar::new(0, 3).percentage(), 5);
        assert_eq!(ProgressBar::new(1, 3).percentage(), 5);
        assert_eq!(ProgressBar::new(2, 3).percentage(), 33);
        assert_eq!(ProgressBar::new(3, 3).percentage(), 66);
        assert_eq!(ProgressBar::new(4, 3).percentage(), 100);

        assert_eq!(ProgressBar::new(1, 3).label(), "Step 0 of 3");
        assert_eq!(ProgressBar::new(3, 3).label(), "Step 2 of 3");
        assert_eq!(ProgressBar::new(4, 3).label(), "Step 3 of 3");
    }
}
