use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::models::{AnswerOption, Question};
use crate::db::types::QuestionType;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct OptionView {
    pub(crate) id: String,
    pub(crate) text: String,
}

/// Student-facing question. Never carries correctness data.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct QuestionView {
    pub(crate) id: String,
    pub(crate) question_type: QuestionType,
    pub(crate) prompt: String,
    pub(crate) points: Decimal,
    pub(crate) position: usize,
    pub(crate) options: Vec<OptionView>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ShuffleSettings {
    pub(crate) shuffle_questions: bool,
    pub(crate) shuffle_answers: bool,
    pub(crate) seed: i32,
}

/// Orders questions and options for one attempt. The same seed always yields
/// the same order, so a resumed attempt sees exactly what it saw at start.
pub(crate) fn build_question_view(
    mut questions: Vec<Question>,
    mut options: Vec<AnswerOption>,
    settings: ShuffleSettings,
) -> Vec<QuestionView> {
    questions.retain(|question| question.is_active);
    questions.sort_by(|a, b| a.order_index.cmp(&b.order_index).then_with(|| a.id.cmp(&b.id)));
    options.sort_by(|a, b| a.order_index.cmp(&b.order_index).then_with(|| a.id.cmp(&b.id)));

    let mut rng = StdRng::seed_from_u64(u64::from(settings.seed as u32));
    if settings.shuffle_questions {
        questions.shuffle(&mut rng);
    }

    questions
        .into_iter()
        .enumerate()
        .map(|(position, question)| {
            let mut question_options: Vec<OptionView> = options
                .iter()
                .filter(|option| option.question_id == question.id)
                .map(|option| OptionView { id: option.id.clone(), text: option.text.clone() })
                .collect();
            if settings.shuffle_answers {
                question_options.shuffle(&mut rng);
            }

            QuestionView {
                id: question.id,
                question_type: question.question_type,
                prompt: question.prompt,
                points: question.points,
                position: position + 1,
                options: question_options,
            }
        })
        .collect()
}
