//! Asynchronous action tracking.
//!
//! Attachment, detach and activation requests return immediately; the
//! backend works them off in the background and exposes progress through a
//! status resource. The monitor polls that resource for a whole wait group
//! at a fixed interval until every action reaches a terminal state or the
//! group's wait budget runs out.

use crate::error::{EngineError, EngineResult};
use crate::target::{ActionHandle, ActionStatus, Target};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Polling configuration for one wait group.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Fixed interval between poll sweeps.
    pub poll_interval: Duration,
    /// Total wait budget shared across all actions in the group.
    pub wait_budget: Duration,
}

impl MonitorConfig {
    /// Creates the production configuration: poll every 10 seconds, give
    /// up after 1800 seconds.
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            wait_budget: Duration::from_secs(1800),
        }
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the wait budget.
    pub fn with_wait_budget(mut self, wait_budget: Duration) -> Self {
        self.wait_budget = wait_budget;
        self
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// State of one tracked action.
///
/// Transitions only via polling: `Submitted` until the status resource
/// reports a terminal outcome or the wait budget runs out. Terminal states
/// are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// Submitted, not yet terminal.
    Submitted,
    /// The backend reported success.
    Succeeded,
    /// The backend reported failure, or the status resource was
    /// unreachable.
    Failed,
    /// The wait budget ran out before a terminal report.
    TimedOut,
}

impl ActionState {
    /// Returns true for terminal states.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ActionState::Submitted)
    }
}

/// One action tracked by a wait group.
#[derive(Debug, Clone)]
pub struct PendingAction {
    /// Submission handle.
    pub handle: ActionHandle,
    /// Human-facing description used in logs.
    pub description: String,
    /// Current state.
    pub state: ActionState,
    /// Failure detail, when the backend reported one.
    pub detail: String,
}

/// Polls a wait group of actions to completion.
pub struct ActionMonitor<'a, T: Target + ?Sized> {
    target: &'a T,
    config: MonitorConfig,
}

impl<'a, T: Target + ?Sized> ActionMonitor<'a, T> {
    /// Creates a monitor over `target`.
    pub fn new(target: &'a T, config: MonitorConfig) -> Self {
        Self { target, config }
    }

    /// Drives a wait group to completion.
    ///
    /// Returns true if every action succeeded. With `raise_on_failure` a
    /// not-all-succeeded group becomes [`EngineError::ActionWaitFailed`],
    /// which normally aborts the surrounding task; without it the outcome
    /// is only logged.
    pub fn wait_for(
        &self,
        actions: Vec<(ActionHandle, String)>,
        context: &str,
        raise_on_failure: bool,
    ) -> EngineResult<bool> {
        if actions.is_empty() {
            return Ok(true);
        }

        let mut group: Vec<PendingAction> = actions
            .into_iter()
            .map(|(handle, description)| PendingAction {
                handle,
                description,
                state: ActionState::Submitted,
                detail: String::new(),
            })
            .collect();

        info!(context, actions = group.len(), "waiting for actions");
        let mut budget = self.config.wait_budget;

        loop {
            for action in group.iter_mut().filter(|a| !a.state.is_terminal()) {
                match self.target.action_status(&action.handle.id) {
                    Ok(ActionStatus::InProgress) => {
                        debug!(action = %action.handle.id, "still in progress");
                    }
                    Ok(ActionStatus::Success) => {
                        action.state = ActionState::Succeeded;
                    }
                    Ok(ActionStatus::Failure(detail)) => {
                        warn!(context, action = %action.handle.id, %detail, "action failed");
                        action.state = ActionState::Failed;
                        action.detail = detail;
                    }
                    // Status resource unreachable: fail this one action
                    // immediately, keep polling the others.
                    Err(e) => {
                        warn!(context, action = %action.handle.id, error = %e,
                              "status resource unreachable");
                        action.state = ActionState::Failed;
                        action.detail = e.to_string();
                    }
                }
            }

            if group.iter().all(|a| a.state.is_terminal()) {
                break;
            }

            if budget < self.config.poll_interval {
                for action in group.iter_mut().filter(|a| !a.state.is_terminal()) {
                    warn!(context, action = %action.handle.id,
                          description = %action.description, "action timed out");
                    action.state = ActionState::TimedOut;
                }
                break;
            }

            std::thread::sleep(self.config.poll_interval);
            budget -= self.config.poll_interval;
        }

        let all_succeeded = group.iter().all(|a| a.state == ActionState::Succeeded);
        if all_succeeded {
            info!(context, "all actions succeeded");
        } else if raise_on_failure {
            return Err(EngineError::ActionWaitFailed {
                context: context.to_string(),
            });
        }

        Ok(all_succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::BatchRequest;
    use crate::target::MemoryTarget;
    use serde_json::json;

    fn fast_config() -> MonitorConfig {
        MonitorConfig::new()
            .with_poll_interval(Duration::from_millis(1))
            .with_wait_budget(Duration::from_millis(5))
    }

    fn submit(target: &MemoryTarget) -> ActionHandle {
        target
            .submit_attachment(&BatchRequest {
                primary_key: "t1".into(),
                entries: vec![("dev-1".into(), json!({}))],
            })
            .unwrap()
    }

    #[test]
    fn empty_group_succeeds() {
        let target = MemoryTarget::new();
        let monitor = ActionMonitor::new(&target, fast_config());
        assert!(monitor.wait_for(vec![], "nothing", true).unwrap());
    }

    #[test]
    fn immediate_success() {
        let target = MemoryTarget::new();
        let handle = submit(&target);

        let monitor = ActionMonitor::new(&target, fast_config());
        let ok = monitor
            .wait_for(vec![(handle, "attach dev-1".into())], "attaching", true)
            .unwrap();
        assert!(ok);
    }

    #[test]
    fn success_after_progress() {
        let target = MemoryTarget::new();
        target.script_action(vec![
            ActionStatus::InProgress,
            ActionStatus::InProgress,
            ActionStatus::Success,
        ]);
        let handle = submit(&target);

        let monitor = ActionMonitor::new(&target, fast_config());
        let ok = monitor
            .wait_for(vec![(handle.clone(), "attach".into())], "attaching", true)
            .unwrap();
        assert!(ok);
        assert_eq!(target.polls_for(&handle.id), 3);
    }

    #[test]
    fn failure_is_reported_not_raised_when_downgraded() {
        let target = MemoryTarget::new();
        target.script_action(vec![ActionStatus::Failure("device unreachable".into())]);
        let handle = submit(&target);

        let monitor = ActionMonitor::new(&target, fast_config());
        let ok = monitor
            .wait_for(vec![(handle, "attach".into())], "attaching", false)
            .unwrap();
        assert!(!ok);
    }

    #[test]
    fn failure_raises_when_asked() {
        let target = MemoryTarget::new();
        target.script_action(vec![ActionStatus::Failure("nope".into())]);
        let handle = submit(&target);

        let monitor = ActionMonitor::new(&target, fast_config());
        let err = monitor
            .wait_for(vec![(handle, "attach".into())], "attaching", true)
            .unwrap_err();
        assert!(matches!(err, EngineError::ActionWaitFailed { .. }));
    }

    #[test]
    fn budget_exhaustion_times_out_once() {
        let target = MemoryTarget::new();
        // Never reaches a terminal state on its own.
        target.script_action(vec![ActionStatus::InProgress]);
        let handle = submit(&target);

        let monitor = ActionMonitor::new(&target, fast_config());
        let ok = monitor
            .wait_for(vec![(handle.clone(), "attach".into())], "attaching", false)
            .unwrap();
        assert!(!ok);
        // Polling is bounded by the budget, not indefinite.
        assert!(target.polls_for(&handle.id) <= 7);
    }

    #[test]
    fn one_failure_does_not_stop_the_group() {
        let target = MemoryTarget::new();
        target.script_action(vec![ActionStatus::Failure("bad".into())]);
        target.script_action(vec![ActionStatus::InProgress, ActionStatus::Success]);

        let first = submit(&target);
        let second = submit(&target);

        let monitor = ActionMonitor::new(&target, fast_config());
        let ok = monitor
            .wait_for(
                vec![
                    (first, "attach first".into()),
                    (second.clone(), "attach second".into()),
                ],
                "attaching",
                false,
            )
            .unwrap();

        assert!(!ok);
        // The second action was still driven to completion.
        assert_eq!(target.polls_for(&second.id), 2);
    }
}
