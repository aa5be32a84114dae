pub(crate) mod attempt_policy;
pub(crate) mod errors;
pub(crate) mod grading;
pub(crate) mod manual_grading;
pub(crate) mod notifications;
pub(crate) mod question_bank;
pub(crate) mod question_view;
pub(crate) mod results;
pub(crate) mod summary;
