//! Subscription lifecycle state machine.
//!
//! | From            | Transition | To        | Rejected when                   |
//! |-----------------|------------|-----------|---------------------------------|
//! | active          | pause      | paused    | not active, or still in trial   |
//! | paused          | unpause    | active    | not paused                      |
//! | active / paused | cancel     | cancelled | never (cancelled is a no-op)    |
//!
//! The functions here are pure; persisting the mutated subscription together
//! with its audit record is the caller's job.

use crate::models::{Subscription, SubscriptionStateChange, SubscriptionStatus};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub const CREATION_REASON: &str = "Subscription created";

/// A user-initiated status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Pause,
    Unpause,
    Cancel,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Pause => "pause",
            Transition::Unpause => "unpause",
            Transition::Cancel => "cancel",
        }
    }

    pub fn target(&self) -> SubscriptionStatus {
        match self {
            Transition::Pause => SubscriptionStatus::Paused,
            Transition::Unpause => SubscriptionStatus::Active,
            Transition::Cancel => SubscriptionStatus::Cancelled,
        }
    }

    /// Reason recorded on the audit trail.
    pub fn reason(&self) -> &'static str {
        match self {
            Transition::Pause => "User requested pause",
            Transition::Unpause => "User requested unpause",
            Transition::Cancel => "User requested cancellation",
        }
    }
}

/// A transition guard failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("subscription is not active")]
    NotActive,

    #[error("subscription is in trial period")]
    InTrial,

    #[error("subscription is not paused")]
    NotPaused,
}

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// Status changed; the audit record must be persisted with the subscription.
    Changed(SubscriptionStateChange),
    /// Nothing to do (cancelling an already-cancelled subscription).
    Unchanged,
}

/// Check the guard for `transition` against `subscription` at `now`.
pub fn check_transition(
    subscription: &Subscription,
    transition: Transition,
    now: DateTime<Utc>,
) -> Result<(), TransitionError> {
    match transition {
        Transition::Pause => {
            if subscription.status != SubscriptionStatus::Active {
                return Err(TransitionError::NotActive);
            }
            if subscription.is_in_trial(now) {
                return Err(TransitionError::InTrial);
            }
            Ok(())
        }
        Transition::Unpause => {
            if subscription.status != SubscriptionStatus::Paused {
                return Err(TransitionError::NotPaused);
            }
            Ok(())
        }
        Transition::Cancel => Ok(()),
    }
}

/// Apply `transition` to `subscription` in place.
///
/// On success the status and `updated_utc` are set and the matching audit
/// record is returned. The version token is left untouched; the store bumps it
/// when the write lands.
pub fn apply_transition(
    subscription: &mut Subscription,
    transition: Transition,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, TransitionError> {
    check_transition(subscription, transition, now)?;

    if transition == Transition::Cancel && subscription.status.is_terminal() {
        return Ok(TransitionOutcome::Unchanged);
    }

    let previous_status = subscription.status;
    subscription.status = transition.target();
    subscription.updated_utc = now;

    Ok(TransitionOutcome::Changed(SubscriptionStateChange {
        change_id: Uuid::new_v4(),
        subscription_id: subscription.subscription_id,
        previous_status: Some(previous_status),
        new_status: subscription.status,
        changed_utc: now,
        reason: transition.reason().to_string(),
    }))
}

/// Audit record written alongside a newly created subscription.
pub fn creation_state_change(subscription: &Subscription) -> SubscriptionStateChange {
    SubscriptionStateChange {
        change_id: Uuid::new_v4(),
        subscription_id: subscription.subscription_id,
        previous_status: None,
        new_status: subscription.status,
        changed_utc: subscription.created_utc,
        reason: CREATION_REASON.to_string(),
    }
}
