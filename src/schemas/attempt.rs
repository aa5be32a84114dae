use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::pagination::default_limit;
use crate::db::types::{AttemptStatus, QuestionType};
use crate::services::question_view::QuestionView;

#[derive(Debug, Clone, Deserialize, Validate)]
pub(crate) struct SaveAnswerRequest {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(default, alias = "selectedOptionIds")]
    #[validate(length(max = 64, message = "too many selected options"))]
    pub(crate) selected_option_ids: Vec<String>,
    #[serde(default, alias = "textAnswer")]
    #[validate(length(max = 50000, message = "text_answer is too long"))]
    pub(crate) text_answer: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct SubmitAttemptRequest {
    #[serde(default)]
    #[validate(nested)]
    pub(crate) answers: Vec<SaveAnswerRequest>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AnswerGradeRequest {
    #[serde(alias = "answerId")]
    #[validate(length(min = 1, message = "answer_id must not be empty"))]
    pub(crate) answer_id: String,
    #[serde(alias = "pointsEarned")]
    pub(crate) points_earned: Decimal,
    #[serde(default)]
    pub(crate) feedback: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GradeAttemptRequest {
    #[serde(default)]
    #[validate(nested)]
    pub(crate) grades: Vec<AnswerGradeRequest>,
    #[serde(default)]
    pub(crate) feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttemptListQuery {
    #[serde(default)]
    pub(crate) status: Option<AttemptStatus>,
    #[serde(default)]
    pub(crate) skip: i64,
    #[serde(default = "default_limit")]
    pub(crate) limit: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResponse {
    pub(crate) id: String,
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) selected_option_ids: Vec<String>,
    pub(crate) text_answer: Option<String>,
    pub(crate) answered_at: String,
    pub(crate) updated_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct StartAttemptResponse {
    pub(crate) attempt_id: String,
    pub(crate) test_id: String,
    pub(crate) attempt_number: i32,
    pub(crate) status: AttemptStatus,
    pub(crate) resumed: bool,
    pub(crate) started_at: String,
    pub(crate) expires_at: Option<String>,
    pub(crate) time_limit_minutes: i32,
    pub(crate) questions: Vec<QuestionView>,
    pub(crate) saved_answers: Vec<AnswerResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultOptionResponse {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) selected: bool,
    /// Only present when answers are disclosed to the viewer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) is_correct: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResultResponse {
    pub(crate) question_id: String,
    pub(crate) answer_id: Option<String>,
    pub(crate) question_type: QuestionType,
    pub(crate) prompt: String,
    pub(crate) points: Decimal,
    pub(crate) options: Vec<ResultOptionResponse>,
    pub(crate) selected_option_ids: Vec<String>,
    pub(crate) text_answer: Option<String>,
    pub(crate) points_earned: Option<Decimal>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) correct_option_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) correct_answers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) explanation: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResultResponse {
    pub(crate) attempt_id: String,
    pub(crate) test_id: String,
    pub(crate) test_title: String,
    pub(crate) student_id: String,
    pub(crate) student_name: Option<String>,
    pub(crate) attempt_number: i32,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: String,
    pub(crate) expires_at: Option<String>,
    pub(crate) submitted_at: Option<String>,
    pub(crate) graded_at: Option<String>,
    pub(crate) score: Option<Decimal>,
    pub(crate) max_score: Option<Decimal>,
    pub(crate) percentage: Option<Decimal>,
    pub(crate) passed: Option<bool>,
    pub(crate) feedback: Option<String>,
    pub(crate) graded_by: Option<String>,
    pub(crate) graded_by_name: Option<String>,
    pub(crate) answers_disclosed: bool,
    pub(crate) questions: Vec<QuestionResultResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitAttemptResponse {
    pub(crate) attempt_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) submitted_at: Option<String>,
    pub(crate) results_available: bool,
    pub(crate) result: Option<AttemptResultResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptListItem {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: Option<String>,
    pub(crate) attempt_number: i32,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) graded_at: Option<String>,
    pub(crate) score: Option<Decimal>,
    pub(crate) max_score: Option<Decimal>,
    pub(crate) percentage: Option<Decimal>,
    pub(crate) passed: Option<bool>,
}
