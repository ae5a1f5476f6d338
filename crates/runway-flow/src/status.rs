//! Status inference engine.
//!
//! The single authoritative mapping from an ingested event (plus the run's
//! current status) to the run's next status. Every call site that needs to
//! derive status from an event goes through [`infer`]; the transition policy
//! lives nowhere else.
//!
//! The engine is a pure function so it can be tested in isolation from
//! storage, and so it is trivially safe under retries and duplicate delivery
//! from a worker communicating over plain request/response: the policy is
//! idempotent per (run, terminal-status) pair rather than per individual
//! call.

use crate::run::RunStatus;

/// Title prefix an external worker uses to signal that it picked up the run.
pub const STARTED_PREFIX: &str = "run started";

/// Title prefix signalling that the run finished all its work.
pub const COMPLETED_PREFIX: &str = "run completed";

/// Title prefix of the synthesized event recording a delegation failure.
pub const DELEGATION_FAILED_PREFIX: &str = "delegation failed";

/// Returns the status an incoming event advances the run to, if any.
///
/// Matching is a case-insensitive prefix check on the event title:
///
/// - "run started" while `queued` advances to `running`
/// - "run completed" while `running` advances to `completed`
/// - "delegation failed" while `queued` advances to `failed`
///
/// Everything else leaves the status untouched. In particular:
///
/// - events on a terminal run never change status (terminal states are
///   sticky, so duplicate or late "run completed" echoes are harmless)
/// - an unrecognized title while `queued` keeps the run `queued` until an
///   explicit start signal arrives, tolerating progress chatter delivered
///   slightly out of order
#[must_use]
pub fn infer(current: RunStatus, title: &str) -> Option<RunStatus> {
    if current.is_terminal() {
        return None;
    }

    let title = title.trim();

    match current {
        RunStatus::Queued if has_prefix(title, STARTED_PREFIX) => Some(RunStatus::Running),
        RunStatus::Queued if has_prefix(title, DELEGATION_FAILED_PREFIX) => Some(RunStatus::Failed),
        RunStatus::Running if has_prefix(title, COMPLETED_PREFIX) => Some(RunStatus::Completed),
        _ => None,
    }
}

fn has_prefix(title: &str, prefix: &str) -> bool {
    // get() rather than slicing: titles are untrusted and may put a
    // multi-byte character across the prefix boundary.
    title
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
