use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder};
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::{AnswerOption, Question};
use crate::db::types::QuestionType;

const COLUMNS: &str = "\
    id, test_id, question_type, prompt, points, order_index, explanation, \
    acceptable_answers, case_sensitive, is_active, created_at, updated_at";

const OPTION_COLUMNS: &str = "id, question_id, text, order_index, is_correct";

pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) test_id: &'a str,
    pub(crate) question_type: QuestionType,
    pub(crate) prompt: &'a str,
    pub(crate) points: Decimal,
    pub(crate) order_index: i32,
    pub(crate) explanation: Option<&'a str>,
    pub(crate) acceptable_answers: Option<&'a str>,
    pub(crate) case_sensitive: bool,
    pub(crate) now: PrimitiveDateTime,
}

pub(crate) struct NewOption {
    pub(crate) text: String,
    pub(crate) is_correct: bool,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (
            id, test_id, question_type, prompt, points, order_index, explanation,
            acceptable_answers, case_sensitive, is_active, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,TRUE,$10,$10)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.test_id)
    .bind(params.question_type)
    .bind(params.prompt)
    .bind(params.points)
    .bind(params.order_index)
    .bind(params.explanation)
    .bind(params.acceptable_answers)
    .bind(params.case_sensitive)
    .bind(params.now)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_active(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
    id: &str,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE test_id = $1 AND id = $2 AND is_active = TRUE"
    ))
    .bind(test_id)
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list_active(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions
         WHERE test_id = $1 AND is_active = TRUE
         ORDER BY order_index, id"
    ))
    .bind(test_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn total_active_points(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
) -> Result<Decimal, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COALESCE(SUM(points), 0) FROM questions WHERE test_id = $1 AND is_active = TRUE",
    )
    .bind(test_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn next_order_index(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COALESCE(MAX(order_index) + 1, 0) FROM questions
         WHERE test_id = $1 AND is_active = TRUE",
    )
    .bind(test_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn update(
    executor: impl sqlx::PgExecutor<'_>,
    question: &Question,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions
         SET question_type = $1,
             prompt = $2,
             points = $3,
             order_index = $4,
             explanation = $5,
             acceptable_answers = $6,
             case_sensitive = $7,
             updated_at = $8
         WHERE id = $9
         RETURNING {COLUMNS}",
    ))
    .bind(question.question_type)
    .bind(&question.prompt)
    .bind(question.points)
    .bind(question.order_index)
    .bind(&question.explanation)
    .bind(&question.acceptable_answers)
    .bind(question.case_sensitive)
    .bind(question.updated_at)
    .bind(&question.id)
    .fetch_one(executor)
    .await
}

/// Soft delete; the row stays so existing answers keep their reference.
pub(crate) async fn deactivate(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
    id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE questions SET is_active = FALSE, updated_at = $1
         WHERE test_id = $2 AND id = $3 AND is_active = TRUE",
    )
    .bind(now)
    .bind(test_id)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn insert_options(
    executor: impl sqlx::PgExecutor<'_>,
    question_id: &str,
    options: &[NewOption],
) -> Result<Vec<AnswerOption>, sqlx::Error> {
    if options.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO answer_options (id, question_id, text, order_index, is_correct) ",
    );
    builder.push_values(options.iter().enumerate(), |mut row, (index, option)| {
        row.push_bind(Uuid::new_v4().to_string())
            .push_bind(question_id.to_string())
            .push_bind(option.text.clone())
            .push_bind(index as i32)
            .push_bind(option.is_correct);
    });
    builder.push(format!(" RETURNING {OPTION_COLUMNS}"));

    let mut inserted = builder.build_query_as::<AnswerOption>().fetch_all(executor).await?;
    inserted.sort_by_key(|option| option.order_index);
    Ok(inserted)
}

pub(crate) async fn delete_options(
    executor: impl sqlx::PgExecutor<'_>,
    question_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM answer_options WHERE question_id = $1")
        .bind(question_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn list_options(
    executor: impl sqlx::PgExecutor<'_>,
    question_id: &str,
) -> Result<Vec<AnswerOption>, sqlx::Error> {
    sqlx::query_as::<_, AnswerOption>(&format!(
        "SELECT {OPTION_COLUMNS} FROM answer_options
         WHERE question_id = $1
         ORDER BY order_index, id"
    ))
    .bind(question_id)
    .fetch_all(executor)
    .await
}

/// Options of every active question of the test.
pub(crate) async fn list_options_for_test(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
) -> Result<Vec<AnswerOption>, sqlx::Error> {
    sqlx::query_as::<_, AnswerOption>(
        "SELECT o.id, o.question_id, o.text, o.order_index, o.is_correct
         FROM answer_options o
         JOIN questions q ON q.id = o.question_id
         WHERE q.test_id = $1 AND q.is_active = TRUE
         ORDER BY o.question_id, o.order_index, o.id",
    )
    .bind(test_id)
    .fetch_all(executor)
    .await
}
