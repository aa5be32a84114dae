use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "courserole", rename_all = "lowercase")]
pub(crate) enum CourseRole {
    Teacher,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "enrollmentstatus", rename_all = "lowercase")]
pub(crate) enum EnrollmentStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "teststatus", rename_all = "lowercase")]
pub(crate) enum TestStatus {
    Draft,
    Published,
    Closed,
}

impl TestStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            TestStatus::Draft => "draft",
            TestStatus::Published => "published",
            TestStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "questiontype", rename_all = "snake_case")]
pub(crate) enum QuestionType {
    MultipleChoice,
    MultipleSelect,
    TrueFalse,
    ShortAnswer,
    Essay,
}

impl QuestionType {
    pub(crate) fn uses_options(self) -> bool {
        matches!(
            self,
            QuestionType::MultipleChoice | QuestionType::MultipleSelect | QuestionType::TrueFalse
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "attemptstatus", rename_all = "snake_case")]
pub(crate) enum AttemptStatus {
    InProgress,
    Submitted,
    Graded,
    TimedOut,
}

impl AttemptStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Graded => "graded",
            AttemptStatus::TimedOut => "timed_out",
        }
    }

    pub(crate) fn is_terminal(self) -> bool {
        matches!(self, AttemptStatus::Graded | AttemptStatus::TimedOut)
    }

    pub(crate) fn can_transition_to(self, next: AttemptStatus) -> bool {
        match self {
            AttemptStatus::InProgress => matches!(
                next,
                AttemptStatus::Submitted | AttemptStatus::Graded | AttemptStatus::TimedOut
            ),
            AttemptStatus::Submitted => next == AttemptStatus::Graded,
            AttemptStatus::Graded | AttemptStatus::TimedOut => false,
        }
    }
}
