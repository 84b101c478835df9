//! Stack deployment state machine.
//!
//! `deploy` reads the stack's current status, issues exactly one mutating
//! call (create or update) and then polls until the matching success status.
//! Stacks left in a rollback state are never touched: they need an operator.
//! Every remote interaction goes through [`StackApi`], and every recognized
//! piece of remote text is classified by [`crate::remote_text`].
use crate::aws::RemoteError;
use crate::config::Capability;
use crate::remote_text::{is_rollback_status, RemoteCondition};
use crate::stack::{render_events, StackDefinition, StackEvent};
use std::collections::BTreeMap;
use std::fmt;

mod poll;

pub use poll::{PollPolicy, Sleeper, ThreadSleeper};

/// Synthetic status for a stack the remote side reports as absent.
pub const NOT_EXIST: &str = "NOT_EXIST";

/// Statuses from which `deploy` may issue an update.
pub const DEFAULT_READY_STATUSES: &[&str] = &[
    "CREATE_COMPLETE",
    "UPDATE_COMPLETE",
    "UPDATE_ROLLBACK_COMPLETE",
    "IMPORT_COMPLETE",
    "IMPORT_ROLLBACK_COMPLETE",
];

/// Expected in-progress and success statuses for one kind of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRule {
    pub operation: &'static str,
    pub in_progress: &'static str,
    pub success: &'static str,
}

pub const CREATE_RULE: StatusRule = StatusRule {
    operation: "create",
    in_progress: "CREATE_IN_PROGRESS",
    success: "CREATE_COMPLETE",
};

pub const UPDATE_RULE: StatusRule = StatusRule {
    operation: "update",
    in_progress: "UPDATE_IN_PROGRESS",
    success: "UPDATE_COMPLETE",
};

pub const DELETE_RULE: StatusRule = StatusRule {
    operation: "delete",
    in_progress: "DELETE_IN_PROGRESS",
    success: NOT_EXIST,
};

/// What a mutating call needs; built only once a template path is known.
#[derive(Debug, Clone, Copy)]
pub struct StackRequest<'a> {
    pub remote_name: &'a str,
    pub template_path: &'a str,
    pub capabilities: &'a [Capability],
    pub parameters: &'a BTreeMap<String, String>,
}

/// Remote operations the state machine consumes.
pub trait StackApi {
    fn describe_status(&self, remote_name: &str) -> Result<String, RemoteError>;
    fn create_stack(&self, request: &StackRequest<'_>) -> Result<(), RemoteError>;
    fn update_stack(&self, request: &StackRequest<'_>) -> Result<(), RemoteError>;
    fn delete_stack(&self, remote_name: &str) -> Result<(), RemoteError>;
    fn describe_events(&self, remote_name: &str) -> Result<Vec<StackEvent>, RemoteError>;
}

/// Initial status as seen by `deploy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Missing,
    Ready,
    Rollback,
    Unrecognized,
}

/// Ready statuses are checked before the rollback marker, so
/// `UPDATE_ROLLBACK_COMPLETE` counts as ready.
pub fn classify_status(status: &str, ready: &[String]) -> StatusClass {
    if status == NOT_EXIST {
        StatusClass::Missing
    } else if ready.iter().any(|candidate| candidate == status) {
        StatusClass::Ready
    } else if is_rollback_status(status) {
        StatusClass::Rollback
    } else {
        StatusClass::Unrecognized
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    Created { status: String },
    Updated { status: String },
    /// `update-stack` reported nothing to change; no polling happened.
    NoChangesNeeded,
}

impl fmt::Display for DeployOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployOutcome::Created { status } => write!(f, "created ({status})"),
            DeployOutcome::Updated { status } => write!(f, "updated ({status})"),
            DeployOutcome::NoChangesNeeded => f.write_str("no updates are to be performed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    /// Status query failed for a reason other than the stack being absent.
    RemoteQuery { stack: String, source: RemoteError },
    StackInRollback {
        stack: String,
        status: String,
        events: Vec<StackEvent>,
    },
    PollingMismatch {
        stack: String,
        expected: String,
        actual: String,
    },
    UnrecognizedStatus { stack: String, status: String },
    PollTimeout {
        stack: String,
        expected: String,
        last: String,
        attempts: u32,
    },
    MissingTemplate { stack: String },
    Mutation {
        stack: String,
        operation: &'static str,
        source: RemoteError,
    },
}

impl fmt::Display for DeployError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployError::RemoteQuery { stack, source } => {
                write!(f, "failed to query status of stack {stack}: {source}")
            }
            DeployError::StackInRollback { stack, status, .. } => write!(
                f,
                "stack {stack} is in {status}; manual intervention required \
                 (repair or delete the stack, then deploy again)"
            ),
            DeployError::PollingMismatch {
                stack,
                expected,
                actual,
            } => write!(
                f,
                "stack {stack} reached {actual} while waiting for {expected}"
            ),
            DeployError::UnrecognizedStatus { stack, status } => write!(
                f,
                "stack {stack} is in {status}; deploy only acts on missing or ready stacks"
            ),
            DeployError::PollTimeout {
                stack,
                expected,
                last,
                attempts,
            } => write!(
                f,
                "gave up waiting for stack {stack} to reach {expected} after {attempts} \
                 status checks (last status {last})"
            ),
            DeployError::MissingTemplate { stack } => {
                write!(f, "stack {stack} has no template path configured")
            }
            DeployError::Mutation {
                stack,
                operation,
                source,
            } => write!(f, "{operation} of stack {stack} failed: {source}"),
        }
    }
}

impl std::error::Error for DeployError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeployError::RemoteQuery { source, .. } | DeployError::Mutation { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Drives one stack at a time through create/update/delete.
pub struct Deployer<'a> {
    api: &'a dyn StackApi,
    sleeper: &'a dyn Sleeper,
    policy: PollPolicy,
    ready_statuses: Vec<String>,
}

impl<'a> Deployer<'a> {
    pub fn new(api: &'a dyn StackApi, sleeper: &'a dyn Sleeper) -> Self {
        Self {
            api,
            sleeper,
            policy: PollPolicy::default(),
            ready_statuses: DEFAULT_READY_STATUSES
                .iter()
                .map(|status| status.to_string())
                .collect(),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_ready_statuses(mut self, ready_statuses: Vec<String>) -> Self {
        self.ready_statuses = ready_statuses;
        self
    }

    /// Current status, with "does not exist" mapped to [`NOT_EXIST`].
    pub fn current_status(&self, remote_name: &str) -> Result<String, DeployError> {
        match self.api.describe_status(remote_name) {
            Ok(status) => Ok(status),
            Err(err) if err.condition() == Some(RemoteCondition::StackMissing) => {
                Ok(NOT_EXIST.to_string())
            }
            Err(err) => Err(DeployError::RemoteQuery {
                stack: remote_name.to_string(),
                source: err,
            }),
        }
    }

    /// Create the stack if it is absent, update it if it is ready, and refuse
    /// anything else.
    pub fn deploy(&self, stack: &StackDefinition) -> Result<DeployOutcome, DeployError> {
        let status = self.current_status(&stack.remote_name)?;
        let class = classify_status(&status, &self.ready_statuses);
        tracing::info!(stack = %stack.remote_name, %status, ?class, "deploy dispatch");
        match class {
            StatusClass::Missing => self.create(stack),
            StatusClass::Ready => self.update(stack),
            StatusClass::Rollback => {
                let events = self.report_events(&stack.remote_name);
                Err(DeployError::StackInRollback {
                    stack: stack.remote_name.clone(),
                    status,
                    events,
                })
            }
            StatusClass::Unrecognized => {
                self.report_events(&stack.remote_name);
                Err(DeployError::UnrecognizedStatus {
                    stack: stack.remote_name.clone(),
                    status,
                })
            }
        }
    }

    pub fn create(&self, stack: &StackDefinition) -> Result<DeployOutcome, DeployError> {
        let request = request_for(stack)?;
        self.api
            .create_stack(&request)
            .map_err(|source| DeployError::Mutation {
                stack: stack.remote_name.clone(),
                operation: CREATE_RULE.operation,
                source,
            })?;
        let status = self.poll_reporting(&stack.remote_name, CREATE_RULE)?;
        Ok(DeployOutcome::Created { status })
    }

    pub fn update(&self, stack: &StackDefinition) -> Result<DeployOutcome, DeployError> {
        let request = request_for(stack)?;
        match self.api.update_stack(&request) {
            Ok(()) => {}
            Err(err) if err.condition() == Some(RemoteCondition::NoUpdates) => {
                tracing::debug!(stack = %stack.remote_name, "update-stack reported no changes");
                return Ok(DeployOutcome::NoChangesNeeded);
            }
            Err(source) => {
                return Err(DeployError::Mutation {
                    stack: stack.remote_name.clone(),
                    operation: UPDATE_RULE.operation,
                    source,
                })
            }
        }
        let status = self.poll_reporting(&stack.remote_name, UPDATE_RULE)?;
        Ok(DeployOutcome::Updated { status })
    }

    pub fn delete(&self, remote_name: &str) -> Result<String, DeployError> {
        self.api
            .delete_stack(remote_name)
            .map_err(|source| DeployError::Mutation {
                stack: remote_name.to_string(),
                operation: DELETE_RULE.operation,
                source,
            })?;
        self.poll_reporting(remote_name, DELETE_RULE)
    }

    /// Poll after a mutating call; dump events before surfacing a failure.
    fn poll_reporting(&self, remote_name: &str, rule: StatusRule) -> Result<String, DeployError> {
        self.poll_until_status(remote_name, rule)
            .inspect_err(|err| {
                if matches!(
                    err,
                    DeployError::PollingMismatch { .. } | DeployError::PollTimeout { .. }
                ) {
                    self.report_events(remote_name);
                }
            })
    }

    /// Best-effort event dump for diagnostics.
    fn report_events(&self, remote_name: &str) -> Vec<StackEvent> {
        match self.api.describe_events(remote_name) {
            Ok(events) => {
                println!("Events for {remote_name}:");
                println!("{}", render_events(&events));
                events
            }
            Err(err) => {
                tracing::warn!(stack = remote_name, error = %err, "could not fetch stack events");
                Vec::new()
            }
        }
    }
}

fn request_for(stack: &StackDefinition) -> Result<StackRequest<'_>, DeployError> {
    let template_path = stack
        .template_path
        .as_deref()
        .ok_or_else(|| DeployError::MissingTemplate {
            stack: stack.name.clone(),
        })?;
    Ok(StackRequest {
        remote_name: &stack.remote_name,
        template_path,
        capabilities: &stack.capabilities,
        parameters: &stack.parameters,
    })
}

#[cfg(test)]
#[path = "deploy_tests.rs"]
mod tests;
