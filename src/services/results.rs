use std::collections::HashMap;

use crate::core::time::{format_optional, format_primitive};
use crate::db::models::{AnswerOption, Question, StudentAnswer, Test, TestAttempt};
use crate::db::types::AttemptStatus;
use crate::schemas::attempt::{
    AttemptResultResponse, QuestionResultResponse, ResultOptionResponse,
};
use crate::services::errors::AssessmentError;
use crate::services::question_bank::parse_acceptable_answers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ViewerRole {
    Student,
    Teacher,
}

pub(crate) fn viewer_role(
    attempt: &TestAttempt,
    test: &Test,
    viewer_id: &str,
) -> Result<ViewerRole, AssessmentError> {
    if test.created_by == viewer_id {
        Ok(ViewerRole::Teacher)
    } else if attempt.student_id == viewer_id {
        Ok(ViewerRole::Student)
    } else {
        Err(AssessmentError::Unauthorized("Not authorized to view this attempt"))
    }
}

/// Returns whether correct answers may be disclosed, or why nothing may be shown.
pub(crate) fn check_visibility(
    role: ViewerRole,
    test: &Test,
    attempt: &TestAttempt,
) -> Result<bool, AssessmentError> {
    if role == ViewerRole::Teacher {
        return Ok(true);
    }

    match attempt.status {
        AttemptStatus::InProgress => {
            return Err(AssessmentError::NotAvailable(
                "Results are not available while the attempt is in progress",
            ))
        }
        AttemptStatus::Submitted if !test.show_results_immediately => {
            return Err(AssessmentError::NotAvailable("Results are not available yet"))
        }
        _ => {}
    }

    Ok(test.show_correct_answers
        && matches!(attempt.status, AttemptStatus::Submitted | AttemptStatus::Graded))
}

pub(crate) struct ResultInput<'a> {
    pub(crate) test: &'a Test,
    pub(crate) attempt: &'a TestAttempt,
    pub(crate) questions: &'a [Question],
    pub(crate) options: &'a [AnswerOption],
    pub(crate) answers: &'a [StudentAnswer],
    pub(crate) student_name: Option<String>,
    pub(crate) grader_name: Option<String>,
}

/// Access check plus assembly of the attempt view for `viewer_id`.
pub(crate) fn build_result(
    input: ResultInput<'_>,
    viewer_id: &str,
) -> Result<AttemptResultResponse, AssessmentError> {
    let role = viewer_role(input.attempt, input.test, viewer_id)?;
    let disclose = check_visibility(role, input.test, input.attempt)?;
    Ok(render_result(input, disclose))
}

pub(crate) fn render_result(input: ResultInput<'_>, disclose: bool) -> AttemptResultResponse {
    let ResultInput { test, attempt, questions, options, answers, student_name, grader_name } =
        input;

    let answers_by_question: HashMap<&str, &StudentAnswer> =
        answers.iter().map(|answer| (answer.question_id.as_str(), answer)).collect();

    let mut ordered: Vec<&Question> = questions.iter().filter(|q| q.is_active).collect();
    ordered.sort_by(|a, b| a.order_index.cmp(&b.order_index).then_with(|| a.id.cmp(&b.id)));

    let questions = ordered
        .into_iter()
        .map(|question| {
            let answer = answers_by_question.get(question.id.as_str()).copied();
            let selected: Vec<String> =
                answer.map(|answer| answer.selected_option_ids.0.clone()).unwrap_or_default();

            let mut question_options: Vec<&AnswerOption> =
                options.iter().filter(|option| option.question_id == question.id).collect();
            question_options
                .sort_by(|a, b| a.order_index.cmp(&b.order_index).then_with(|| a.id.cmp(&b.id)));

            let correct_option_ids = (disclose && question.question_type.uses_options()).then(|| {
                question_options
                    .iter()
                    .filter(|option| option.is_correct)
                    .map(|option| option.id.clone())
                    .collect()
            });
            let correct_answers = match (&question.acceptable_answers, disclose) {
                (Some(raw), true) => Some(parse_acceptable_answers(raw)),
                _ => None,
            };

            QuestionResultResponse {
                question_id: question.id.clone(),
                answer_id: answer.map(|answer| answer.id.clone()),
                question_type: question.question_type,
                prompt: question.prompt.clone(),
                points: question.points,
                options: question_options
                    .iter()
                    .map(|option| ResultOptionResponse {
                        id: option.id.clone(),
                        text: option.text.clone(),
                        selected: selected.contains(&option.id),
                        is_correct: disclose.then_some(option.is_correct),
                    })
                    .collect(),
                selected_option_ids: selected.clone(),
                text_answer: answer.and_then(|answer| answer.text_answer.clone()),
                points_earned: answer.and_then(|answer| answer.points_earned),
                is_correct: answer.and_then(|answer| answer.is_correct),
                feedback: answer.and_then(|answer| answer.feedback.clone()),
                correct_option_ids,
                correct_answers,
                explanation: if disclose { question.explanation.clone() } else { None },
            }
        })
        .collect();

    AttemptResultResponse {
        attempt_id: attempt.id.clone(),
        test_id: test.id.clone(),
        test_title: test.title.clone(),
        student_id: attempt.student_id.clone(),
        student_name,
        attempt_number: attempt.attempt_number,
        status: attempt.status,
        started_at: format_primitive(attempt.started_at),
        expires_at: format_optional(attempt.expires_at),
        submitted_at: format_optional(attempt.submitted_at),
        graded_at: format_optional(attempt.graded_at),
        score: attempt.score,
        max_score: attempt.max_score,
        percentage: attempt.percentage,
        passed: attempt.passed,
        feedback: attempt.feedback.clone(),
        graded_by: attempt.graded_by.clone(),
        graded_by_name: grader_name,
        answers_disclosed: disclose,
        questions,
    }
}
