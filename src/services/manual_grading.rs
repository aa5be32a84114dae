use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::db::types::AttemptStatus;
use crate::services::errors::AssessmentError;
use crate::services::grading::{compute_totals, round2, AttemptTotals};

#[derive(Debug, Clone)]
pub(crate) struct ManualGrade {
    pub(crate) answer_id: String,
    pub(crate) points_earned: Decimal,
    pub(crate) feedback: Option<String>,
}

/// An answer row of the attempt together with the points its question is worth.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GradedAnswer {
    pub(crate) answer_id: String,
    pub(crate) question_points: Decimal,
    pub(crate) points_earned: Option<Decimal>,
    pub(crate) is_correct: Option<bool>,
    pub(crate) feedback: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct MergeOutcome {
    pub(crate) answers: Vec<GradedAnswer>,
    /// Ids of answers touched by this call, in attempt order.
    pub(crate) changed: Vec<String>,
    pub(crate) totals: AttemptTotals,
    pub(crate) status: AttemptStatus,
}

/// Applies teacher grades and recomputes the attempt from every answer.
/// The attempt only becomes `Graded` once no answer is left without points.
pub(crate) fn merge_grades(
    status: AttemptStatus,
    mut answers: Vec<GradedAnswer>,
    grades: &[ManualGrade],
    passing_score: Decimal,
) -> Result<MergeOutcome, AssessmentError> {
    if status != AttemptStatus::Submitted {
        return Err(AssessmentError::BadRequest(format!(
            "Attempt is not awaiting grading (status: {})",
            status.as_str()
        )));
    }

    let positions: HashMap<String, usize> = answers
        .iter()
        .enumerate()
        .map(|(index, answer)| (answer.answer_id.clone(), index))
        .collect();

    let mut touched = vec![false; answers.len()];
    for grade in grades {
        let Some(&index) = positions.get(&grade.answer_id) else {
            return Err(AssessmentError::BadRequest(format!(
                "Answer {} does not belong to this attempt",
                grade.answer_id
            )));
        };

        let answer = &mut answers[index];
        let points = round2(grade.points_earned.clamp(Decimal::ZERO, answer.question_points));
        answer.points_earned = Some(points);
        answer.is_correct = Some(points == answer.question_points);
        answer.feedback = grade.feedback.clone();
        touched[index] = true;
    }

    let totals = compute_totals(
        answers.iter().map(|answer| (answer.question_points, answer.points_earned)),
        passing_score,
    );
    let status =
        if totals.is_final() { AttemptStatus::Graded } else { AttemptStatus::Submitted };

    let changed = answers
        .iter()
        .zip(&touched)
        .filter(|(_, touched)| **touched)
        .map(|(answer, _)| answer.answer_id.clone())
        .collect();

    Ok(MergeOutcome { answers, changed, totals, status })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn answer(id: &str, points: i64, earned: Option<i64>) -> GradedAnswer {
        GradedAnswer {
            answer_id: id.to_string(),
            question_points: Decimal::from(points),
            points_earned: earned.map(Decimal::from),
            is_correct: earned.map(|value| value == points),
            feedback: None,
        }
    }

    fn grade(id: &str, points: &str) -> ManualGrade {
        ManualGrade {
            answer_id: id.to_string(),
            points_earned: Decimal::from_str(points).unwrap(),
            feedback: Some("See rubric".to_string()),
        }
    }

    #[test]
    fn grading_the_last_essay_finalizes_the_attempt() {
        let answers = vec![answer("mc", 2, Some(2)), answer("essay", 8, None)];
        let outcome = merge_grades(
            AttemptStatus::Submitted,
            answers,
            &[grade("essay", "6")],
            Decimal::from(70),
        )
        .unwrap();

        assert_eq!(outcome.status, AttemptStatus::Graded);
        assert_eq!(outcome.totals.score, Decimal::from(8));
        assert_eq!(outcome.totals.max_score, Decimal::from(10));
        assert_eq!(outcome.totals.percentage, Some(Decimal::from(80)));
        assert_eq!(outcome.totals.passed, Some(true));
        assert_eq!(outcome.changed, vec!["essay".to_string()]);
        assert_eq!(outcome.answers[1].is_correct, Some(false));
        assert_eq!(outcome.answers[1].feedback.as_deref(), Some("See rubric"));
    }

    #[test]
    fn points_are_clamped_to_the_question_range() {
        let answers = vec![answer("e1", 5, None), answer("e2", 5, None)];
        let outcome = merge_grades(
            AttemptStatus::Submitted,
            answers,
            &[grade("e1", "9"), grade("e2", "-3")],
            Decimal::from(50),
        )
        .unwrap();

        assert_eq!(outcome.answers[0].points_earned, Some(Decimal::from(5)));
        assert_eq!(outcome.answers[0].is_correct, Some(true));
        assert_eq!(outcome.answers[1].points_earned, Some(Decimal::ZERO));
        assert_eq!(outcome.answers[1].is_correct, Some(false));
        assert_eq!(outcome.totals.percentage, Some(Decimal::from(50)));
        assert_eq!(outcome.totals.passed, Some(true));
    }

    #[test]
    fn remaining_ungraded_answers_keep_the_attempt_submitted() {
        let answers = vec![answer("e1", 5, None), answer("e2", 5, None)];
        let outcome =
            merge_grades(AttemptStatus::Submitted, answers, &[grade("e1", "4")], Decimal::from(50))
                .unwrap();

        assert_eq!(outcome.status, AttemptStatus::Submitted);
        assert_eq!(outcome.totals.score, Decimal::from(4));
        assert_eq!(outcome.totals.percentage, None);
        assert_eq!(outcome.totals.passed, None);
    }

    #[test]
    fn totals_are_recomputed_not_accumulated() {
        let answers = vec![answer("mc", 2, Some(2)), answer("e1", 4, None), answer("e2", 4, None)];
        let first =
            merge_grades(AttemptStatus::Submitted, answers, &[grade("e1", "4")], Decimal::from(60))
                .unwrap();
        assert_eq!(first.totals.score, Decimal::from(6));

        let regraded = merge_grades(
            AttemptStatus::Submitted,
            first.answers,
            &[grade("e1", "1"), grade("e2", "2")],
            Decimal::from(60),
        )
        .unwrap();
        assert_eq!(regraded.totals.score, Decimal::from(5));
        assert_eq!(regraded.totals.percentage, Some(Decimal::from(50)));
        assert_eq!(regraded.totals.passed, Some(false));
        assert_eq!(regraded.status, AttemptStatus::Graded);
    }

    #[test]
    fn foreign_answer_ids_are_rejected() {
        let answers = vec![answer("e1", 5, None)];
        let err = merge_grades(
            AttemptStatus::Submitted,
            answers,
            &[grade("other", "1")],
            Decimal::from(50),
        )
        .unwrap_err();
        assert!(matches!(err, AssessmentError::BadRequest(_)));
    }

    #[test]
    fn only_submitted_attempts_accept_grades() {
        for status in [AttemptStatus::InProgress, AttemptStatus::Graded, AttemptStatus::TimedOut] {
            let err = merge_grades(status, vec![answer("e1", 5, None)], &[], Decimal::ZERO)
                .unwrap_err();
            assert!(matches!(err, AssessmentError::BadRequest(_)));
        }
    }
}
