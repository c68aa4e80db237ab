//! Lesson completion and module unlock rules.
//!
//! Both gates share one pass rule for quizzes (see [`quiz_passed`]). The
//! caller passes the acting user explicitly; nothing here reads request state.

use std::collections::{HashMap, HashSet};

use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::core::config::QuizPassPolicy;
use crate::core::time::primitive_now_utc;
use crate::db::models::Progress;
use crate::repositories;

#[derive(Debug, Error)]
pub(crate) enum GateError {
    #[error("lesson not found")]
    LessonNotFound,
    #[error("lesson does not belong to course")]
    LessonNotInCourse,
    #[error("quiz not passed")]
    QuizNotPassed,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Attempt {
    pub(crate) score: i32,
    pub(crate) submitted_at: PrimitiveDateTime,
}

/// Whether a user's attempts at one quiz count as a pass.
///
/// No attempts never pass. A quiz without a passing score is passed by any attempt.
pub(crate) fn quiz_passed(
    passing_score: Option<i32>,
    attempts: &[Attempt],
    policy: QuizPassPolicy,
) -> bool {
    if attempts.is_empty() {
        return false;
    }
    let Some(threshold) = passing_score else {
        return true;
    };

    match policy {
        QuizPassPolicy::AnyPassing => attempts.iter().any(|attempt| attempt.score >= threshold),
        QuizPassPolicy::LatestOnly => attempts
            .iter()
            .max_by_key(|attempt| attempt.submitted_at)
            .is_some_and(|latest| latest.score >= threshold),
    }
}

/// Module ids (in the given order) that stay locked for a user.
///
/// `modules` must be sorted by unlock order. A module is locked when any
/// strictly earlier module has a quiz missing from `passed_quizzes`.
pub(crate) fn compute_locked_modules(
    modules: &[String],
    quizzes_by_module: &HashMap<String, Vec<String>>,
    passed_quizzes: &HashSet<String>,
) -> Vec<String> {
    let mut locked = Vec::new();

    for (index, candidate) in modules.iter().enumerate().skip(1) {
        let blocked = modules[..index].iter().any(|earlier| {
            quizzes_by_module
                .get(earlier)
                .is_some_and(|quizzes| quizzes.iter().any(|quiz| !passed_quizzes.contains(quiz)))
        });
        if blocked {
            locked.push(candidate.clone());
        }
    }

    locked
}

async fn user_passed_quiz(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: &str,
    quiz_id: &str,
    passing_score: Option<i32>,
    policy: QuizPassPolicy,
) -> Result<bool, sqlx::Error> {
    let attempts: Vec<Attempt> =
        repositories::quizzes::list_scores_for_user(executor, user_id, &[quiz_id.to_string()])
            .await?
            .into_iter()
            .map(|row| Attempt { score: row.score, submitted_at: row.submitted_at })
            .collect();
    Ok(quiz_passed(passing_score, &attempts, policy))
}

/// True when the lesson has no quiz or the user passed it.
pub(crate) async fn can_complete(
    conn: &mut PgConnection,
    user_id: &str,
    lesson_id: &str,
    policy: QuizPassPolicy,
) -> Result<bool, sqlx::Error> {
    let Some(quiz) = repositories::quizzes::find_by_lesson(&mut *conn, lesson_id).await? else {
        return Ok(true);
    };
    user_passed_quiz(&mut *conn, user_id, &quiz.id, quiz.passing_score, policy).await
}

/// Marks a lesson complete or incomplete for a user.
///
/// Completing requires a passed quiz when the lesson has one. The lesson
/// row is upserted with `percent` 100 or 0, and the course enrollment row is
/// created if missing, in one transaction.
pub(crate) async fn set_completion(
    pool: &PgPool,
    user_id: &str,
    course_id: &str,
    lesson_id: &str,
    completed: bool,
    time_spent_sec: Option<i32>,
    policy: QuizPassPolicy,
) -> Result<Progress, GateError> {
    let mut tx = pool.begin().await?;

    let lesson = repositories::lessons::find_by_id(&mut *tx, lesson_id)
        .await?
        .ok_or(GateError::LessonNotFound)?;
    if lesson.course_id != course_id {
        return Err(GateError::LessonNotInCourse);
    }

    if completed && !can_complete(&mut *tx, user_id, lesson_id, policy).await? {
        return Err(GateError::QuizNotPassed);
    }

    let now = primitive_now_utc();
    repositories::progress::ensure_enrollment(&mut *tx, user_id, course_id, now).await?;
    let progress = repositories::progress::upsert_lesson(
        &mut *tx,
        user_id,
        course_id,
        lesson_id,
        completed,
        time_spent_sec,
        now,
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %user_id,
        course_id = %course_id,
        lesson_id = %lesson_id,
        completed,
        "Lesson progress updated"
    );

    Ok(progress)
}

/// Locked module ids of a course for one user, loading each input once.
pub(crate) async fn locked_modules(
    pool: &PgPool,
    course_id: &str,
    user_id: &str,
    policy: QuizPassPolicy,
) -> Result<Vec<String>, sqlx::Error> {
    let modules: Vec<String> = repositories::course_modules::list_by_course(pool, course_id)
        .await?
        .into_iter()
        .map(|module| module.id)
        .collect();
    if modules.len() < 2 {
        return Ok(Vec::new());
    }

    let quizzes = repositories::quizzes::list_for_course(pool, course_id).await?;
    let quiz_ids: Vec<String> = quizzes.iter().map(|quiz| quiz.quiz_id.clone()).collect();
    let passed = passed_quiz_set(pool, user_id, &quizzes, &quiz_ids, policy).await?;

    let mut quizzes_by_module: HashMap<String, Vec<String>> = HashMap::new();
    for quiz in quizzes {
        quizzes_by_module.entry(quiz.module_id).or_default().push(quiz.quiz_id);
    }

    Ok(compute_locked_modules(&modules, &quizzes_by_module, &passed))
}

async fn passed_quiz_set(
    pool: &PgPool,
    user_id: &str,
    quizzes: &[repositories::quizzes::CourseQuizRow],
    quiz_ids: &[String],
    policy: QuizPassPolicy,
) -> Result<HashSet<String>, sqlx::Error> {
    if quiz_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let mut attempts: HashMap<String, Vec<Attempt>> = HashMap::new();
    for row in repositories::quizzes::list_scores_for_user(pool, user_id, quiz_ids).await? {
        attempts
            .entry(row.quiz_id)
            .or_default()
            .push(Attempt { score: row.score, submitted_at: row.submitted_at });
    }

    Ok(quizzes
        .iter()
        .filter(|quiz| {
            let user_attempts = attempts.get(&quiz.quiz_id).map(Vec::as_slice).unwrap_or(&[]);
            quiz_passed(quiz.passing_score, user_attempts, policy)
        })
        .map(|quiz| quiz.quiz_id.clone())
        .collect())
}
