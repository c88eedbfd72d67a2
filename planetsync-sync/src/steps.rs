//! Ordered step execution with per-step failure policy.
//!
//! The update transaction interleaves steps that must abort the sequence
//! with steps that only warn. Encoding the policy on each step and running
//! them through one driver keeps that dual behavior auditable instead of
//! buried in control flow.

/// How a step's failure affects the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// Failure aborts the sequence and fails the whole update.
    Fatal,
    /// Failure is recorded as a warning; the sequence continues.
    BestEffort,
}

/// What happened to one executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Ok,
    Warned(String),
    Failed(String),
}

/// One step of the update transaction.
pub struct Step<'a> {
    pub name: &'static str,
    pub policy: StepPolicy,
    pub run: Box<dyn FnOnce() -> Result<(), String> + 'a>,
}

impl<'a> Step<'a> {
    pub fn fatal(
        name: &'static str,
        run: impl FnOnce() -> Result<(), String> + 'a,
    ) -> Self {
        Self {
            name,
            policy: StepPolicy::Fatal,
            run: Box::new(run),
        }
    }

    pub fn best_effort(
        name: &'static str,
        run: impl FnOnce() -> Result<(), String> + 'a,
    ) -> Self {
        Self {
            name,
            policy: StepPolicy::BestEffort,
            run: Box::new(run),
        }
    }
}

/// Result of driving a step sequence.
#[derive(Debug)]
pub struct UpdateReport {
    pub success: bool,
    /// Executed steps in order, with their outcomes. Steps after a fatal
    /// failure never run and are not recorded.
    pub steps: Vec<(&'static str, StepOutcome)>,
}

impl UpdateReport {
    /// Warning messages collected from best-effort failures.
    pub fn warnings(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter_map(|(_, outcome)| match outcome {
                StepOutcome::Warned(msg) => Some(msg.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Execute steps in order; stop at the first fatal failure.
pub fn drive(steps: Vec<Step<'_>>) -> UpdateReport {
    let total = steps.len();
    let mut executed = Vec::with_capacity(total);

    for (index, step) in steps.into_iter().enumerate() {
        tracing::info!("step {}/{}: {}", index + 1, total, step.name);

        match (step.run)() {
            Ok(()) => executed.push((step.name, StepOutcome::Ok)),
            Err(message) => match step.policy {
                StepPolicy::Fatal => {
                    tracing::error!(step = step.name, %message, "fatal step failed; aborting");
                    executed.push((step.name, StepOutcome::Failed(message)));
                    return UpdateReport {
                        success: false,
                        steps: executed,
                    };
                }
                StepPolicy::BestEffort => {
                    tracing::warn!(step = step.name, %message, "step failed; continuing");
                    executed.push((step.name, StepOutcome::Warned(message)));
                }
            },
        }
    }

    UpdateReport {
        success: true,
        steps: executed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn all_ok_steps_succeed() {
        let report = drive(vec![
            Step::fatal("one", || Ok(())),
            Step::best_effort("two", || Ok(())),
        ]);
        assert!(report.success);
        assert_eq!(report.steps.len(), 2);
        assert!(report.warnings().is_empty());
    }

    #[test]
    fn fatal_failure_stops_the_sequence() {
        let ran_after = Cell::new(false);
        let report = drive(vec![
            Step::fatal("explodes", || Err("boom".into())),
            Step::fatal("unreachable", || {
                ran_after.set(true);
                Ok(())
            }),
        ]);
        assert!(!report.success);
        assert!(!ran_after.get(), "steps after a fatal failure must not run");
        assert_eq!(report.steps.len(), 1);
        assert!(matches!(report.steps[0].1, StepOutcome::Failed(_)));
    }

    #[test]
    fn best_effort_failures_accumulate_warnings() {
        let report = drive(vec![
            Step::best_effort("warns once", || Err("first".into())),
            Step::fatal("still runs", || Ok(())),
            Step::best_effort("warns twice", || Err("second".into())),
        ]);
        assert!(report.success, "best-effort failures never fail the update");
        assert_eq!(report.warnings(), vec!["first", "second"]);
    }

    #[test]
    fn steps_run_in_declaration_order() {
        let log = std::cell::RefCell::new(Vec::new());
        let push = |name: &'static str| {
            log.borrow_mut().push(name);
            Ok(())
        };
        drive(vec![
            Step::fatal("a", || push("a")),
            Step::best_effort("b", || push("b")),
            Step::fatal("c", || push("c")),
        ]);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }
}
