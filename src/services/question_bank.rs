use std::collections::{BTreeSet, HashSet};

use rust_decimal::Decimal;
use thiserror::Error;

use crate::db::models::{AnswerOption, Question};
use crate::db::types::QuestionType;
use crate::services::errors::AssessmentError;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum QuestionError {
    #[error("points must be greater than zero")]
    NonPositivePoints,
    #[error("{0:?} questions need at least two answer options")]
    TooFewOptions(QuestionType),
    #[error("{0:?} questions need exactly one correct option")]
    SingleCorrectRequired(QuestionType),
    #[error("multiple select questions need at least one correct option")]
    NoCorrectOption,
    #[error("answer option text must not be empty")]
    EmptyOptionText,
    #[error("{0:?} questions must not have answer options")]
    UnexpectedOptions(QuestionType),
    #[error("short answer questions need at least one acceptable answer")]
    NoAcceptableAnswers,
}

impl From<QuestionError> for AssessmentError {
    fn from(err: QuestionError) -> Self {
        AssessmentError::BadRequest(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct OptionDraft<'a> {
    pub(crate) text: &'a str,
    pub(crate) is_correct: bool,
}

/// Checks a question before it is written to the bank.
pub(crate) fn validate_question(
    question_type: QuestionType,
    points: Decimal,
    options: &[OptionDraft<'_>],
    acceptable_answers: Option<&str>,
) -> Result<(), QuestionError> {
    if points <= Decimal::ZERO {
        return Err(QuestionError::NonPositivePoints);
    }

    if !question_type.uses_options() {
        if !options.is_empty() {
            return Err(QuestionError::UnexpectedOptions(question_type));
        }
        if question_type == QuestionType::ShortAnswer
            && parse_acceptable_answers(acceptable_answers.unwrap_or_default()).is_empty()
        {
            return Err(QuestionError::NoAcceptableAnswers);
        }
        return Ok(());
    }

    if options.len() < 2 {
        return Err(QuestionError::TooFewOptions(question_type));
    }
    if options.iter().any(|option| option.text.trim().is_empty()) {
        return Err(QuestionError::EmptyOptionText);
    }

    let correct = options.iter().filter(|option| option.is_correct).count();
    match question_type {
        QuestionType::MultipleSelect if correct == 0 => Err(QuestionError::NoCorrectOption),
        QuestionType::MultipleChoice | QuestionType::TrueFalse if correct != 1 => {
            Err(QuestionError::SingleCorrectRequired(question_type))
        }
        _ => Ok(()),
    }
}

pub(crate) fn parse_acceptable_answers(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty()).map(str::to_string).collect()
}

/// Scoring data for one question type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AnswerKey {
    /// MultipleChoice and TrueFalse.
    SingleChoice { correct: String },
    MultipleSelect { correct: BTreeSet<String> },
    ShortAnswer { accepted: Vec<String>, case_sensitive: bool },
    Essay,
}

#[derive(Debug, Clone)]
pub(crate) struct GradableQuestion {
    pub(crate) id: String,
    pub(crate) points: Decimal,
    pub(crate) key: AnswerKey,
}

impl GradableQuestion {
    pub(crate) fn from_rows(
        question: &Question,
        options: &[AnswerOption],
    ) -> Result<Self, QuestionError> {
        if question.points <= Decimal::ZERO {
            return Err(QuestionError::NonPositivePoints);
        }

        let correct_ids = || {
            options
                .iter()
                .filter(|option| option.question_id == question.id && option.is_correct)
                .map(|option| option.id.clone())
        };

        let key = match question.question_type {
            QuestionType::MultipleChoice | QuestionType::TrueFalse => {
                let mut correct = correct_ids();
                match (correct.next(), correct.next()) {
                    (Some(id), None) => AnswerKey::SingleChoice { correct: id },
                    _ => return Err(QuestionError::SingleCorrectRequired(question.question_type)),
                }
            }
            QuestionType::MultipleSelect => {
                let correct: BTreeSet<String> = correct_ids().collect();
                if correct.is_empty() {
                    return Err(QuestionError::NoCorrectOption);
                }
                AnswerKey::MultipleSelect { correct }
            }
            QuestionType::ShortAnswer => {
                let accepted =
                    parse_acceptable_answers(question.acceptable_answers.as_deref().unwrap_or(""));
                if accepted.is_empty() {
                    return Err(QuestionError::NoAcceptableAnswers);
                }
                AnswerKey::ShortAnswer { accepted, case_sensitive: question.case_sensitive }
            }
            QuestionType::Essay => AnswerKey::Essay,
        };

        Ok(Self { id: question.id.clone(), points: question.points, key })
    }
}

/// Answer payload after it has been checked against the question it targets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct NormalizedAnswer {
    pub(crate) selected_option_ids: Vec<String>,
    pub(crate) text_answer: Option<String>,
}

/// Choice questions keep only selections (deduplicated, in request order) and
/// reject ids that are not options of this question; text questions keep only text.
pub(crate) fn normalize_answer(
    question: &Question,
    options: &[AnswerOption],
    selected_option_ids: &[String],
    text_answer: Option<&str>,
) -> Result<NormalizedAnswer, AssessmentError> {
    if !question.question_type.uses_options() {
        if !selected_option_ids.is_empty() {
            return Err(AssessmentError::bad_request(
                "This question expects a text answer, not selected options",
            ));
        }
        return Ok(NormalizedAnswer {
            selected_option_ids: Vec::new(),
            text_answer: text_answer.map(str::to_string),
        });
    }

    let known: HashSet<&str> = options
        .iter()
        .filter(|option| option.question_id == question.id)
        .map(|option| option.id.as_str())
        .collect();

    let mut seen = HashSet::new();
    let mut selected = Vec::with_capacity(selected_option_ids.len());
    for id in selected_option_ids {
        if !known.contains(id.as_str()) {
            return Err(AssessmentError::BadRequest(format!(
                "Option {id} does not belong to question {}",
                question.id
            )));
        }
        if seen.insert(id.as_str()) {
            selected.push(id.clone());
        }
    }

    Ok(NormalizedAnswer { selected_option_ids: selected, text_answer: None })
}
