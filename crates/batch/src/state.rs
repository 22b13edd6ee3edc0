use crate::error::{ErrorKind, Result};
use pressroom_transform::{Failure, Success, TransformOutcome};

/// What a batch amounted to once every file reported back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchResult {
    /// No files were submitted.
    Empty,
    AllFailed {
        failures: Vec<Failure>,
    },
    /// At least one file succeeded. Successes are in completion order.
    Succeeded {
        successes: Vec<Success>,
        failures: Vec<Failure>,
    },
}
impl BatchResult {
    pub fn successes(&self) -> &[Success] {
        match self {
            BatchResult::Succeeded { successes, .. } => successes,
            _ => &[],
        }
    }

    pub fn failures(&self) -> &[Failure] {
        match self {
            BatchResult::Empty => &[],
            BatchResult::AllFailed { failures } | BatchResult::Succeeded { failures, .. } => failures,
        }
    }
}

/// Outcomes collected so far for one batch.
///
/// Owned by a single aggregating loop; [`record()`](Self::record) both stores
/// an outcome and checks for completion, so there is no window in which two
/// callers could both observe the batch finishing.
#[derive(Debug)]
pub struct BatchState {
    expected: usize,
    recorded: usize,
    successes: Vec<Success>,
    failures: Vec<Failure>,
}
impl BatchState {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            recorded: 0,
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn recorded(&self) -> usize {
        self.recorded
    }

    pub fn is_complete(&self) -> bool {
        self.recorded == self.expected
    }

    /// Store one outcome. Returns the [`BatchResult`] on exactly the call
    /// that completes the batch, and `None` before that.
    ///
    /// ```
    /// use pressroom_batch::{BatchResult, BatchState};
    /// use pressroom_transform::{Failure, TransformOutcome};
    ///
    /// let mut state = BatchState::new(1);
    /// let outcome = TransformOutcome::Failed(Failure { source_name: "a.pdf".into(), cause: "tool exited with code 1".into() });
    /// assert!(matches!(state.record(outcome).unwrap(), Some(BatchResult::AllFailed { .. })));
    /// ```
    pub fn record(&mut self, outcome: TransformOutcome) -> Result<Option<BatchResult>> {
        if self.is_complete() {
            exn::bail!(ErrorKind::Overflow { expected: self.expected });
        }
        self.recorded += 1;
        match outcome {
            TransformOutcome::Succeeded(success) => self.successes.push(success),
            TransformOutcome::Failed(failure) => self.failures.push(failure),
        }
        if !self.is_complete() {
            return Ok(None);
        }
        let failures = std::mem::take(&mut self.failures);
        Ok(Some(match self.successes.is_empty() {
            true => BatchResult::AllFailed { failures },
            false => BatchResult::Succeeded {
                successes: std::mem::take(&mut self.successes),
                failures,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pressroom_storage::{Area, Scratch};
    use pressroom_storage::backend::LocalBackend;
    use rstest::rstest;
    use std::sync::Arc;

    fn outcomes(pattern: &str) -> Vec<TransformOutcome> {
        let dir = tempfile::tempdir().unwrap();
        let scratch = Scratch::new(Arc::new(LocalBackend::new("scratch", dir.path()).unwrap()));
        pattern.chars()
            .enumerate()
            .map(|(i, c)| match c {
                'S' => TransformOutcome::Succeeded(Success {
                    source_name: format!("{i}.pdf"),
                    display_name: format!("compressed_{i}.pdf"),
                    output: scratch.allocate(Area::Output, "out.pdf"),
                    size: 1,
                }),
                _ => TransformOutcome::Failed(Failure {
                    source_name: format!("{i}.pdf"),
                    cause: "tool exited with code 1".to_string(),
                }),
            })
            .collect()
    }

    #[rstest]
    #[case("S", 1, 0)]
    #[case("F", 0, 1)]
    #[case("SF", 1, 1)]
    #[case("FS", 1, 1)]
    #[case("FFS", 1, 2)]
    #[case("FFF", 0, 3)]
    #[case("SSSS", 4, 0)]
    fn test_completes_on_last_outcome(#[case] spec: &str, #[case] successes: usize, #[case] failures: usize) {
        let outcomes = outcomes(spec);
        let mut state = BatchState::new(outcomes.len());
        let mut results = Vec::new();
        for (i, outcome) in outcomes.into_iter().enumerate() {
            assert!(!state.is_complete());
            if let Some(result) = state.record(outcome).unwrap() {
                results.push((i, result));
            }
        }
        assert!(state.is_complete());
        assert_eq!(results.len(), 1);
        let (at, result) = results.remove(0);
        assert_eq!(at, spec.len() - 1);
        assert_eq!(result.successes().len(), successes);
        assert_eq!(result.failures().len(), failures);
        if successes == 0 {
            assert!(matches!(result, BatchResult::AllFailed { .. }));
        }
    }

    #[test]
    fn test_record_after_completion_is_rejected() {
        let mut outcomes = outcomes("SF");
        let mut state = BatchState::new(1);
        assert!(state.record(outcomes.remove(0)).unwrap().is_some());
        let err = state.record(outcomes.remove(0)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Overflow { expected: 1 }));
        assert_eq!(state.recorded(), 1);
    }

    #[test]
    fn test_empty_state_is_complete() {
        let state = BatchState::new(0);
        assert!(state.is_complete());
        assert_eq!(BatchResult::Empty.successes().len(), 0);
    }
}
