use serde::Serialize;

/// Current position in a wizard of `total` steps, always within `1..=total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepController {
    current: usize,
    total: usize,
}

impl StepController {
    pub fn new(total: usize) -> Self {
        Self {
            current: 1,
            total: total.max(1),
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_first(&self) -> bool {
        self.current == 1
    }

    pub fn is_last(&self) -> bool {
        self.current == self.total
    }

    /// One step forward; no-op on the last step. Does not validate anything.
    pub fn advance(&mut self) {
        self.current = (self.current + 1).min(self.total);
    }

    /// One step back; no-op on the first step.
    pub fn retreat(&mut self) {
        self.current = self.current.saturating_sub(1).max(1);
    }

    /// Jump to `step` when it is in range. Returns whether the jump happened.
    pub fn go_to(&mut self, step: usize) -> bool {
        if (1..=self.total).contains(&step) {
            self.current = step;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_is_idempotent_at_last_step() {
        let mut s = StepController::new(5);
        for _ in 0..10 {
            s.advance();
        }
        assert_eq!(s.current(), 5);
        assert!(s.is_last());
        s.advance();
        assert_eq!(s.current(), 5);
    }

    #[test]
    fn retreat_is_idempotent_at_first_step() {
        let mut s = StepController::new(5);
        s.retreat();
        assert_eq!(s.current(), 1);
        s.advance();
        s.advance();
        s.retreat();
        assert_eq!(s.current(), 2);
    }

    #[test]
    fn go_to_ignores_out_of_range() {
        let mut s = StepController::new(5);
        assert!(s.go_to(4));
        assert_eq!(s.current(), 4);
        assert!(!s.go_to(0));
        assert!(!s.go_to(6));
        assert_eq!(s.current(), 4);
    }

    #[test]
    fn zero_total_still_has_one_step() {
        let mut s = StepController::new(0);
        assert_eq!(s.total(), 1);
        s.advance();
        assert!(s.is_first() && s.is_last());
    }
}
