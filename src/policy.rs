//! Decision policy: maps the critique recommendation and the retry budget to
//! the next control-flow transition.
//!
//! Pure and side-effect free so the rule table can be tested without
//! constructing a run.

use crate::model::{Decision, RefinementStrategy};

/// Decide the next transition after a critique.
///
/// Rules, evaluated in order:
/// 1. The retry ceiling dominates: once `retry_count >= max_retries`, the
///    answer is `End` regardless of what the critique recommends.
/// 2. A missing strategy also ends the run.
/// 3. Otherwise the recommendation passes through unchanged.
pub fn decide(
    strategy: Option<RefinementStrategy>,
    retry_count: u32,
    max_retries: u32,
) -> Decision {
    if retry_count >= max_retries {
        return Decision::End;
    }
    match strategy {
        None => Decision::End,
        Some(RefinementStrategy::Approve) => Decision::Approve,
        Some(RefinementStrategy::Reject) => Decision::Reject,
        Some(RefinementStrategy::Regenerate) => Decision::Regenerate,
        Some(RefinementStrategy::Enhance) => Decision::Enhance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RefinementStrategy as S;

    #[test]
    fn strategies_pass_through_under_budget() {
        assert_eq!(decide(Some(S::Approve), 0, 3), Decision::Approve);
        assert_eq!(decide(Some(S::Reject), 0, 3), Decision::Reject);
        assert_eq!(decide(Some(S::Regenerate), 0, 3), Decision::Regenerate);
        assert_eq!(decide(Some(S::Enhance), 0, 3), Decision::Enhance);
    }

    #[test]
    fn missing_strategy_ends_run() {
        assert_eq!(decide(None, 0, 3), Decision::End);
    }

    #[test]
    fn ceiling_dominates_every_strategy() {
        assert_eq!(decide(Some(S::Regenerate), 3, 3), Decision::End);
        assert_eq!(decide(Some(S::Enhance), 3, 3), Decision::End);
        assert_eq!(decide(Some(S::Approve), 3, 3), Decision::End);
        assert_eq!(decide(None, 3, 3), Decision::End);
    }

    #[test]
    fn ceiling_applies_when_exceeded() {
        assert_eq!(decide(Some(S::Regenerate), 4, 3), Decision::End);
    }

    #[test]
    fn last_attempt_under_ceiling_still_loops() {
        assert_eq!(decide(Some(S::Regenerate), 2, 3), Decision::Regenerate);
    }

    #[test]
    fn zero_budget_never_loops() {
        assert_eq!(decide(Some(S::Regenerate), 0, 0), Decision::End);
        assert_eq!(decide(Some(S::Approve), 0, 0), Decision::End);
    }
}
