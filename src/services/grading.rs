use std::collections::{BTreeSet, HashMap};

use rust_decimal::{Decimal, RoundingStrategy};

use crate::services::question_bank::{AnswerKey, GradableQuestion};

/// What the student handed in for one question.
#[derive(Debug, Clone, Default)]
pub(crate) struct AnswerSubmission {
    pub(crate) selected_option_ids: Vec<String>,
    pub(crate) text_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QuestionScore {
    pub(crate) question_id: String,
    /// `None` while the question waits for a teacher.
    pub(crate) points_earned: Option<Decimal>,
    pub(crate) is_correct: Option<bool>,
}

impl QuestionScore {
    pub(crate) fn needs_manual_grading(&self) -> bool {
        self.points_earned.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AttemptTotals {
    pub(crate) score: Decimal,
    pub(crate) max_score: Decimal,
    pub(crate) percentage: Option<Decimal>,
    pub(crate) passed: Option<bool>,
}

impl AttemptTotals {
    pub(crate) fn is_final(&self) -> bool {
        self.percentage.is_some()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AttemptGrade {
    pub(crate) scores: Vec<QuestionScore>,
    pub(crate) totals: AttemptTotals,
}

pub(crate) fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub(crate) fn score_question(
    question: &GradableQuestion,
    answer: Option<&AnswerSubmission>,
) -> QuestionScore {
    let empty = AnswerSubmission::default();
    let answer = answer.unwrap_or(&empty);

    let (points_earned, is_correct) = match &question.key {
        AnswerKey::SingleChoice { correct } => {
            let hit = matches!(answer.selected_option_ids.as_slice(), [only] if only == correct);
            (Some(if hit { question.points } else { Decimal::ZERO }), Some(hit))
        }
        AnswerKey::MultipleSelect { correct } => {
            let (earned, exact) = score_multiple_select(question.points, correct, answer);
            (Some(earned), Some(exact))
        }
        AnswerKey::ShortAnswer { accepted, case_sensitive } => {
            let hit = answer
                .text_answer
                .as_deref()
                .map(|text| matches_short_answer(text, accepted, *case_sensitive))
                .unwrap_or(false);
            (Some(if hit { question.points } else { Decimal::ZERO }), Some(hit))
        }
        AnswerKey::Essay => (None, None),
    };

    QuestionScore { question_id: question.id.clone(), points_earned, is_correct }
}

fn score_multiple_select(
    points: Decimal,
    correct: &BTreeSet<String>,
    answer: &AnswerSubmission,
) -> (Decimal, bool) {
    debug_assert!(!correct.is_empty(), "multiple select question without a correct option");
    if correct.is_empty() {
        return (Decimal::ZERO, false);
    }

    let selected: BTreeSet<&str> = answer.selected_option_ids.iter().map(String::as_str).collect();
    let exact = selected.len() == correct.len()
        && correct.iter().all(|id| selected.contains(id.as_str()));
    if exact {
        return (points, true);
    }

    let hits = selected.iter().filter(|id| correct.contains(**id)).count();
    let misses = selected.len() - hits;
    let net = Decimal::from(hits as i64 - misses as i64);
    let earned = points * net / Decimal::from(correct.len() as u64);

    (round2(earned.max(Decimal::ZERO)), false)
}

fn matches_short_answer(text: &str, accepted: &[String], case_sensitive: bool) -> bool {
    let given = text.trim();
    if given.is_empty() {
        return false;
    }
    if case_sensitive {
        accepted.iter().any(|candidate| candidate == given)
    } else {
        let given = given.to_lowercase();
        accepted.iter().any(|candidate| candidate.to_lowercase() == given)
    }
}

/// Totals over `(question points, points earned)` pairs. Any ungraded entry
/// leaves `percentage` and `passed` unset.
pub(crate) fn compute_totals(
    entries: impl IntoIterator<Item = (Decimal, Option<Decimal>)>,
    passing_score: Decimal,
) -> AttemptTotals {
    let mut score = Decimal::ZERO;
    let mut max_score = Decimal::ZERO;
    let mut pending = false;

    for (points, earned) in entries {
        max_score += points;
        match earned {
            Some(value) => score += value,
            None => pending = true,
        }
    }

    if pending {
        return AttemptTotals { score, max_score, percentage: None, passed: None };
    }

    let percentage = if max_score.is_zero() {
        Decimal::ZERO
    } else {
        round2(score * Decimal::ONE_HUNDRED / max_score)
    };

    AttemptTotals {
        score,
        max_score,
        percentage: Some(percentage),
        passed: Some(percentage >= passing_score),
    }
}

/// Scores every question of the test; unanswered questions earn nothing but
/// still count toward the maximum.
pub(crate) fn grade_attempt(
    questions: &[GradableQuestion],
    answers: &HashMap<String, AnswerSubmission>,
    passing_score: Decimal,
) -> AttemptGrade {
    let scores: Vec<QuestionScore> = questions
        .iter()
        .map(|question| score_question(question, answers.get(&question.id)))
        .collect();

    let totals = compute_totals(
        questions
            .iter()
            .zip(&scores)
            .map(|(question, score)| (question.points, score.points_earned)),
        passing_score,
    );

    AttemptGrade { scores, totals }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    fn single(id: &str, points: i64, correct: &str) -> GradableQuestion {
        GradableQuestion {
            id: id.to_string(),
            points: Decimal::from(points),
            key: AnswerKey::SingleChoice { correct: correct.to_string() },
        }
    }

    fn multi(id: &str, points: i64, correct: &[&str]) -> GradableQuestion {
        GradableQuestion {
            id: id.to_string(),
            points: Decimal::from(points),
            key: AnswerKey::MultipleSelect {
                correct: correct.iter().map(|item| item.to_string()).collect(),
            },
        }
    }

    fn short(id: &str, accepted: &[&str], case_sensitive: bool) -> GradableQuestion {
        GradableQuestion {
            id: id.to_string(),
            points: Decimal::ONE,
            key: AnswerKey::ShortAnswer {
                accepted: accepted.iter().map(|item| item.to_string()).collect(),
                case_sensitive,
            },
        }
    }

    fn essay(id: &str, points: i64) -> GradableQuestion {
        let points = Decimal::from(points);
        GradableQuestion { id: id.to_string(), points, key: AnswerKey::Essay }
    }

    fn selected(ids: &[&str]) -> AnswerSubmission {
        AnswerSubmission {
            selected_option_ids: ids.iter().map(|id| id.to_string()).collect(),
            text_answer: None,
        }
    }

    fn text(value: &str) -> AnswerSubmission {
        AnswerSubmission { selected_option_ids: Vec::new(), text_answer: Some(value.to_string()) }
    }

    #[test]
    fn single_choice_awards_full_points_only_for_the_lone_correct_option() {
        let question = single("q1", 2, "c");

        let hit = score_question(&question, Some(&selected(&["c"])));
        assert_eq!(hit.points_earned, Some(Decimal::from(2)));
        assert_eq!(hit.is_correct, Some(true));

        let miss = score_question(&question, Some(&selected(&["a"])));
        assert_eq!(miss.points_earned, Some(Decimal::ZERO));
        assert_eq!(miss.is_correct, Some(false));

        let both = score_question(&question, Some(&selected(&["c", "a"])));
        assert_eq!(both.points_earned, Some(Decimal::ZERO));
        assert_eq!(both.is_correct, Some(false));

        let blank = score_question(&question, None);
        assert_eq!(blank.points_earned, Some(Decimal::ZERO));
        assert_eq!(blank.is_correct, Some(false));
    }

    #[test]
    fn multiple_select_gives_partial_credit() {
        let question = multi("q1", 4, &["A", "B", "C"]);
        let score = score_question(&question, Some(&selected(&["A", "B", "D"])));
        assert_eq!(score.points_earned, Some(dec("1.33")));
        assert_eq!(score.is_correct, Some(false));
    }

    #[test]
    fn multiple_select_exact_match_is_full_credit() {
        let question = multi("q1", 4, &["A", "B", "C"]);
        let score = score_question(&question, Some(&selected(&["C", "A", "B"])));
        assert_eq!(score.points_earned, Some(Decimal::from(4)));
        assert_eq!(score.is_correct, Some(true));
    }

    #[test]
    fn multiple_select_never_goes_negative() {
        let question = multi("q1", 4, &["A", "B", "C"]);
        let score = score_question(&question, Some(&selected(&["A", "D", "E"])));
        assert_eq!(score.points_earned, Some(Decimal::ZERO));
        assert_eq!(score.is_correct, Some(false));
    }

    #[test]
    fn multiple_select_subset_is_partial_not_correct() {
        let question = multi("q1", 3, &["A", "B"]);
        let score = score_question(&question, Some(&selected(&["A"])));
        assert_eq!(score.points_earned, Some(dec("1.50")));
        assert_eq!(score.is_correct, Some(false));
    }

    #[test]
    fn partial_credit_rounds_midpoint_away_from_zero() {
        assert_eq!(round2(dec("0.125")), dec("0.13"));
        assert_eq!(round2(dec("2.675")), dec("2.68"));
        assert_eq!(round2(dec("1.3349")), dec("1.33"));
    }

    #[test]
    fn short_answer_respects_case_sensitivity() {
        let insensitive = short("q1", &["Paris"], false);
        let score = score_question(&insensitive, Some(&text("paris")));
        assert_eq!(score.points_earned, Some(Decimal::ONE));
        assert_eq!(score.is_correct, Some(true));

        let sensitive = short("q1", &["Paris"], true);
        let score = score_question(&sensitive, Some(&text("paris")));
        assert_eq!(score.points_earned, Some(Decimal::ZERO));
        assert_eq!(score.is_correct, Some(false));
    }

    #[test]
    fn short_answer_trims_and_matches_any_accepted_value() {
        let question = short("q1", &["Lutetia", "Paris"], true);
        let score = score_question(&question, Some(&text("  Paris \n")));
        assert_eq!(score.is_correct, Some(true));

        let blank = score_question(&question, Some(&text("   ")));
        assert_eq!(blank.is_correct, Some(false));
    }

    #[test]
    fn essay_is_left_for_manual_grading() {
        let score = score_question(&essay("q1", 10), Some(&text("Long answer")));
        assert_eq!(score.points_earned, None);
        assert_eq!(score.is_correct, None);
        assert!(score.needs_manual_grading());
    }

    #[test]
    fn pending_essay_keeps_percentage_and_passed_unset() {
        let questions = vec![single("q1", 2, "a"), essay("q2", 8)];
        let answers = HashMap::from([("q1".to_string(), selected(&["a"]))]);

        let grade = grade_attempt(&questions, &answers, Decimal::from(50));

        assert_eq!(grade.totals.score, Decimal::from(2));
        assert_eq!(grade.totals.max_score, Decimal::from(10));
        assert_eq!(grade.totals.percentage, None);
        assert_eq!(grade.totals.passed, None);
        assert!(!grade.totals.is_final());
    }

    #[test]
    fn unanswered_questions_count_toward_max_score() {
        let questions =
            vec![single("q1", 2, "a"), multi("q2", 4, &["x", "y"]), short("q3", &["z"], false)];
        let answers = HashMap::from([("q1".to_string(), selected(&["a"]))]);

        let grade = grade_attempt(&questions, &answers, Decimal::from(60));

        assert_eq!(grade.scores.len(), 3);
        assert_eq!(grade.totals.score, Decimal::from(2));
        assert_eq!(grade.totals.max_score, Decimal::from(7));
        assert_eq!(grade.totals.percentage, Some(dec("28.57")));
        assert_eq!(grade.totals.passed, Some(false));
    }

    #[test]
    fn passing_is_inclusive_of_the_threshold() {
        let totals = compute_totals(
            [
                (Decimal::from(4), Some(Decimal::from(3))),
                (Decimal::from(4), Some(Decimal::from(3))),
            ],
            Decimal::from(75),
        );
        assert_eq!(totals.percentage, Some(Decimal::from(75)));
        assert_eq!(totals.passed, Some(true));
    }

    #[test]
    fn empty_test_scores_zero_percent() {
        let totals = compute_totals(std::iter::empty(), Decimal::ZERO);
        assert_eq!(totals.percentage, Some(Decimal::ZERO));
        assert_eq!(totals.passed, Some(true));
    }
}
