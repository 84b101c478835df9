//! Recognized phrases in AWS CLI error output.
//!
//! The AWS CLI reports several expected situations only as free-form error
//! text. Every phrase the tool depends on lives in [`RECOGNIZED`], and
//! [`classify`] is the only place that inspects remote text, so a change in
//! the CLI's wording is a one-line edit here.
use regex::Regex;
use std::sync::OnceLock;

/// Typed meaning of a recognized remote message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCondition {
    /// `describe-stacks` was asked about a stack that does not exist.
    StackMissing,
    /// `update-stack` found the template and parameters identical to the deployed stack.
    NoUpdates,
}

/// (pattern, condition) pairs, checked in order.
const RECOGNIZED: &[(&str, RemoteCondition)] = &[
    (r"Stack with id \S+ does not exist", RemoteCondition::StackMissing),
    (r"No updates are to be performed", RemoteCondition::NoUpdates),
];

/// Marker substring for stacks stuck in (or left by) a rollback.
pub const ROLLBACK_MARKER: &str = "ROLLBACK";

fn compiled() -> &'static [(Regex, RemoteCondition)] {
    static TABLE: OnceLock<Vec<(Regex, RemoteCondition)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        RECOGNIZED
            .iter()
            .filter_map(|(pattern, condition)| {
                Regex::new(pattern).ok().map(|regex| (regex, *condition))
            })
            .collect()
    })
}

/// Map remote error text to a known condition, if any.
pub fn classify(message: &str) -> Option<RemoteCondition> {
    compiled()
        .iter()
        .find(|(regex, _)| regex.is_match(message))
        .map(|(_, condition)| *condition)
}

pub fn is_rollback_status(status: &str) -> bool {
    status.contains(ROLLBACK_MARKER)
}
