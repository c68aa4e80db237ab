use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::models::{Quiz, QuizOption, QuizQuestion, QuizSubmission};

const QUIZ_COLUMNS: &str = "id, lesson_id, passing_score, randomized, created_at, updated_at";
const SUBMISSION_COLUMNS: &str = "id, quiz_id, user_id, score, answers, submitted_at";

/// Quiz gate data for one lesson of a course, in unlock order.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct CourseQuizRow {
    pub(crate) quiz_id: String,
    pub(crate) lesson_id: String,
    pub(crate) module_id: String,
    pub(crate) passing_score: Option<i32>,
}

/// Score and time of a submission, enough to evaluate the pass rule.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct SubmissionScore {
    pub(crate) quiz_id: String,
    pub(crate) score: i32,
    pub(crate) submitted_at: time::PrimitiveDateTime,
}

pub(crate) struct NewQuestion {
    pub(crate) prompt: String,
    pub(crate) options: Vec<NewOption>,
}

pub(crate) struct NewOption {
    pub(crate) text: String,
    pub(crate) is_correct: bool,
}

pub(crate) async fn find_by_lesson(
    executor: impl sqlx::PgExecutor<'_>,
    lesson_id: &str,
) -> Result<Option<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE lesson_id = $1"))
        .bind(lesson_id)
        .fetch_optional(executor)
        .await
}

pub(crate) async fn list_questions(
    pool: &PgPool,
    quiz_id: &str,
) -> Result<Vec<QuizQuestion>, sqlx::Error> {
    sqlx::query_as::<_, QuizQuestion>(
        "SELECT id, quiz_id, prompt, order_index FROM quiz_questions
         WHERE quiz_id = $1
         ORDER BY order_index, id",
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_options(
    pool: &PgPool,
    quiz_id: &str,
) -> Result<Vec<QuizOption>, sqlx::Error> {
    sqlx::query_as::<_, QuizOption>(
        "SELECT o.id, o.question_id, o.text, o.is_correct, o.order_index
         FROM quiz_options o
         JOIN quiz_questions q ON q.id = o.question_id
         WHERE q.quiz_id = $1
         ORDER BY q.order_index, o.order_index, o.id",
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await
}

/// Replaces the quiz of a lesson, questions and options included.
pub(crate) async fn replace_for_lesson(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    lesson_id: &str,
    passing_score: Option<i32>,
    randomized: bool,
    questions: &[NewQuestion],
    now: time::PrimitiveDateTime,
) -> Result<Quiz, sqlx::Error> {
    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        "INSERT INTO quizzes (id, lesson_id, passing_score, randomized, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $5)
         ON CONFLICT (lesson_id) DO UPDATE
         SET passing_score = EXCLUDED.passing_score,
             randomized = EXCLUDED.randomized,
             updated_at = EXCLUDED.updated_at
         RETURNING {QUIZ_COLUMNS}"
    ))
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(lesson_id)
    .bind(passing_score)
    .bind(randomized)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;

    sqlx::query(
        "DELETE FROM quiz_options
         WHERE question_id IN (SELECT id FROM quiz_questions WHERE quiz_id = $1)",
    )
    .bind(&quiz.id)
    .execute(&mut **tx)
    .await?;
    sqlx::query("DELETE FROM quiz_questions WHERE quiz_id = $1")
        .bind(&quiz.id)
        .execute(&mut **tx)
        .await?;

    for (question_index, question) in questions.iter().enumerate() {
        let question_id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO quiz_questions (id, quiz_id, prompt, order_index) VALUES ($1, $2, $3, $4)",
        )
        .bind(&question_id)
        .bind(&quiz.id)
        .bind(&question.prompt)
        .bind(question_index as i32)
        .execute(&mut **tx)
        .await?;

        for (option_index, option) in question.options.iter().enumerate() {
            sqlx::query(
                "INSERT INTO quiz_options (id, question_id, text, is_correct, order_index)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&question_id)
            .bind(&option.text)
            .bind(option.is_correct)
            .bind(option_index as i32)
            .execute(&mut **tx)
            .await?;
        }
    }

    Ok(quiz)
}

/// Quizzes attached to published lessons of a course.
pub(crate) async fn list_for_course(
    pool: &PgPool,
    course_id: &str,
) -> Result<Vec<CourseQuizRow>, sqlx::Error> {
    sqlx::query_as::<_, CourseQuizRow>(
        "SELECT q.id AS quiz_id, l.id AS lesson_id, l.module_id, q.passing_score
         FROM quizzes q
         JOIN lessons l ON l.id = q.lesson_id
         WHERE l.course_id = $1 AND l.published = TRUE",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn create_submission(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
    user_id: &str,
    score: i32,
    answers: serde_json::Value,
    submitted_at: time::PrimitiveDateTime,
) -> Result<QuizSubmission, sqlx::Error> {
    sqlx::query_as::<_, QuizSubmission>(&format!(
        "INSERT INTO quiz_submissions (id, quiz_id, user_id, score, answers, submitted_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {SUBMISSION_COLUMNS}"
    ))
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(quiz_id)
    .bind(user_id)
    .bind(score)
    .bind(Json(answers))
    .bind(submitted_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_scores_for_user(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: &str,
    quiz_ids: &[String],
) -> Result<Vec<SubmissionScore>, sqlx::Error> {
    sqlx::query_as::<_, SubmissionScore>(
        "SELECT quiz_id, score, submitted_at FROM quiz_submissions
         WHERE user_id = $1 AND quiz_id = ANY($2)
         ORDER BY submitted_at",
    )
    .bind(user_id)
    .bind(quiz_ids)
    .fetch_all(executor)
    .await
}
