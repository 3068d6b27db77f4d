//! Patience-based early stopping over validation rounds.

#[derive(Debug, Clone, PartialEq)]
pub struct EarlyStopping {
    patience:      usize,
    rounds_waited: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self { patience, rounds_waited: 0 }
    }

    /// Record one validation round. Returns true when training should stop.
    pub fn observe(&mut self, improved: bool) -> bool {
        if improved {
            self.rounds_waited = 0;
        } else {
            self.rounds_waited += 1;
        }
        self.rounds_waited >= self.patience
    }

    pub fn rounds_waited(&self) -> usize {
        self.rounds_waited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_after_patience_rounds() {
        let mut es = EarlyStopping::new(2);
        assert!(!es.observe(true));
        assert!(!es.observe(false));
        assert!(es.observe(false));
        assert_eq!(es.rounds_waited(), 2);
    }

    #[test]
    fn test_improvement_resets_counter() {
        let mut es = EarlyStopping::new(2);
        assert!(!es.observe(false));
        assert!(!es.observe(true));
        assert!(!es.observe(false));
        assert_eq!(es.rounds_waited(), 1);
    }
}
