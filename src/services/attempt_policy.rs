use time::{Duration, PrimitiveDateTime};

use crate::db::models::{Test, TestAttempt};
use crate::db::types::{AttemptStatus, TestStatus};
use crate::services::errors::AssessmentError;

/// Published and inside the availability window.
pub(crate) fn ensure_startable(test: &Test, now: PrimitiveDateTime) -> Result<(), AssessmentError> {
    match test.status {
        TestStatus::Published => {}
        TestStatus::Draft => return Err(AssessmentError::bad_request("Test is not published")),
        TestStatus::Closed => return Err(AssessmentError::bad_request("Test is closed")),
    }

    if let Some(from) = test.available_from {
        if now < from {
            return Err(AssessmentError::bad_request("Test is not available yet"));
        }
    }
    if let Some(until) = test.available_until {
        if now > until {
            return Err(AssessmentError::bad_request("Test is no longer available"));
        }
    }

    Ok(())
}

pub(crate) fn is_expired(
    attempt: &TestAttempt,
    now: PrimitiveDateTime,
    grace_seconds: u64,
) -> bool {
    match attempt.expires_at {
        Some(expires_at) => now > expires_at + Duration::seconds(grace_seconds as i64),
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StartAction {
    Resume(String),
    Create { attempt_number: i32 },
    LimitReached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StartPlan {
    /// Overdue in-progress attempt that must be timed out first.
    pub(crate) expire: Option<String>,
    pub(crate) action: StartAction,
}

/// Decides what a start request does given the student's current state for the test.
/// `finished_attempts` counts attempts that are no longer in progress.
pub(crate) fn plan_start(
    in_progress: Option<&TestAttempt>,
    finished_attempts: i64,
    max_attempts: i32,
    now: PrimitiveDateTime,
) -> StartPlan {
    let mut finished = finished_attempts;
    let mut expire = None;

    if let Some(attempt) = in_progress {
        if !is_expired(attempt, now, 0) {
            return StartPlan { expire: None, action: StartAction::Resume(attempt.id.clone()) };
        }
        expire = Some(attempt.id.clone());
        finished += 1;
    }

    let action = if max_attempts > 0 && finished >= i64::from(max_attempts) {
        StartAction::LimitReached
    } else {
        StartAction::Create { attempt_number: (finished + 1) as i32 }
    };

    StartPlan { expire, action }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptWindow {
    Open,
    Expired,
}

/// Owner and status checks shared by answer saves and submission.
pub(crate) fn check_open(
    attempt: &TestAttempt,
    student_id: &str,
    now: PrimitiveDateTime,
    grace_seconds: u64,
) -> Result<AttemptWindow, AssessmentError> {
    if attempt.student_id != student_id {
        return Err(AssessmentError::Unauthorized("Not authorized to access this attempt"));
    }
    if attempt.status != AttemptStatus::InProgress {
        return Err(AssessmentError::BadRequest(format!(
            "Attempt is not in progress (status: {})",
            attempt.status.as_str()
        )));
    }
    if is_expired(attempt, now, grace_seconds) {
        return Ok(AttemptWindow::Expired);
    }
    Ok(AttemptWindow::Open)
}

pub(crate) fn ensure_transition(
    from: AttemptStatus,
    to: AttemptStatus,
) -> Result<(), AssessmentError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(AssessmentError::Conflict(format!(
            "Attempt cannot move from {} to {}",
            from.as_str(),
            to.as_str()
        )))
    }
}
