// libs/booking-cell/src/services/policy.rs
//
// The temporal/financial rule engine over Booking.status. Everything here is
// a pure function of the booking state, the policy snapshot, and `now`, so
// the whole engine is testable without a database.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use catalog_cell::models::{AdminOverrideRefund, BookingPolicySetting, CancellationPolicy};

use crate::models::{BookingError, BookingStatus};

/// Valid next statuses for a given current status. Terminal states admit
/// nothing, including a return to pending/confirmed.
pub fn valid_transitions(current: BookingStatus) -> Vec<BookingStatus> {
    match current {
        BookingStatus::Pending => vec![BookingStatus::Confirmed, BookingStatus::Cancelled],
        BookingStatus::Confirmed => vec![
            BookingStatus::Completed,
            BookingStatus::Cancelled,
            BookingStatus::NoShow,
        ],
        BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow => vec![],
    }
}

pub fn validate_status_transition(
    current: BookingStatus,
    new: BookingStatus,
) -> Result<(), BookingError> {
    if !valid_transitions(current).contains(&new) {
        warn!("invalid status transition attempted: {} -> {}", current, new);
        return Err(BookingError::InvalidStatusTransition(current));
    }
    debug!("status transition validated: {} -> {}", current, new);
    Ok(())
}

/// Cancellation is open to pending and confirmed bookings up to the
/// appointment time. Past the start only the no-show sweep or an admin
/// override may act.
pub fn check_cancellable(
    status: BookingStatus,
    minutes_until: i64,
    admin_override: bool,
) -> Result<(), BookingError> {
    if !matches!(status, BookingStatus::Pending | BookingStatus::Confirmed) {
        return Err(BookingError::InvalidStatusTransition(status));
    }
    if minutes_until < 0 && !admin_override {
        return Err(BookingError::CancellationNotAllowed(
            "Appointment time has passed; use the no-show flow or contact an administrator"
                .to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CancellationOutcome {
    pub fee: f64,
    pub refund: f64,
    /// Amount to hand to the external credit ledger (credit-only policies).
    pub credited: f64,
}

/// `refund = total - fee`, with the fee chosen by the policy snapshot. A
/// booking without a policy reference predates policy enforcement and
/// refunds in full.
pub fn cancellation_outcome(
    policy: Option<&BookingPolicySetting>,
    total_amount: f64,
    minutes_until: i64,
    admin_override: bool,
) -> CancellationOutcome {
    let Some(policy) = policy else {
        return CancellationOutcome {
            fee: 0.0,
            refund: total_amount,
            credited: 0.0,
        };
    };

    if admin_override && policy.admin_override_refund == AdminOverrideRefund::Full {
        return CancellationOutcome {
            fee: 0.0,
            refund: total_amount,
            credited: 0.0,
        };
    }

    let fee = match policy.cancellation_policy {
        CancellationPolicy::FullRefund => 0.0,
        CancellationPolicy::NoRefund => total_amount,
        CancellationPolicy::WindowedFee => {
            if minutes_until < policy.cancellation_window_hours * 60 {
                policy.late_cancellation_fee.min(total_amount)
            } else {
                0.0
            }
        }
        CancellationPolicy::CreditOnly => 0.0,
    };

    if policy.cancellation_policy == CancellationPolicy::CreditOnly {
        return CancellationOutcome {
            fee,
            refund: 0.0,
            credited: total_amount,
        };
    }

    CancellationOutcome {
        fee,
        refund: (total_amount - fee).max(0.0),
        credited: 0.0,
    }
}

/// Attempts are checked first: an exhausted counter rejects the reschedule
/// regardless of how far out the appointment still is.
pub fn check_reschedulable(
    policy: Option<&BookingPolicySetting>,
    status: BookingStatus,
    reschedule_attempts: i64,
    minutes_until: i64,
    new_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), BookingError> {
    if status.is_terminal() {
        return Err(BookingError::InvalidStatusTransition(status));
    }

    if let Some(policy) = policy {
        if reschedule_attempts >= policy.max_reschedule_attempts {
            return Err(BookingError::RescheduleNotAllowed(format!(
                "Maximum of {} reschedules reached",
                policy.max_reschedule_attempts
            )));
        }
    }

    if minutes_until < 0 {
        return Err(BookingError::RescheduleNotAllowed(
            "Appointment time has passed".to_string(),
        ));
    }

    if let Some(policy) = policy {
        if minutes_until < policy.reschedule_window_hours * 60 {
            return Err(BookingError::RescheduleNotAllowed(format!(
                "Reschedules close {} hours before the appointment",
                policy.reschedule_window_hours
            )));
        }
        if new_start < now + Duration::hours(policy.reschedule_advance_notice_hours) {
            return Err(BookingError::RescheduleNotAllowed(format!(
                "New time must be at least {} hours from now",
                policy.reschedule_advance_notice_hours
            )));
        }
    }

    Ok(())
}

/// One-way no-show condition evaluated by the periodic sweep. Only confirmed
/// bookings qualify, which is what makes re-running the sweep a no-op.
pub fn no_show_due(
    status: BookingStatus,
    appointment_start: DateTime<Utc>,
    no_show_minutes: i64,
    now: DateTime<Utc>,
) -> bool {
    status == BookingStatus::Confirmed
        && now > appointment_start + Duration::minutes(no_show_minutes)
}
