//! Explicit deletion routines. Foreign keys do not cascade, so every
//! dependent table is cleared here in dependency order.

use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum DeletionError {
    #[error("not found")]
    NotFound,
    #[error("user still owns {0} courses")]
    OwnsCourses(i64),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

type Tx<'a> = sqlx::Transaction<'a, sqlx::Postgres>;

/// Removes a user and everything they own except courses, which must be
/// reassigned or deleted first.
pub(crate) async fn delete_user(tx: &mut Tx<'_>, user_id: &str) -> Result<(), DeletionError> {
    let owned = crate::repositories::courses::count_owned_by(&mut **tx, user_id).await?;
    if owned > 0 {
        return Err(DeletionError::OwnsCourses(owned));
    }

    let statements = [
        "DELETE FROM notifications WHERE user_id = $1
            OR workshop_id IN (SELECT id FROM workshops WHERE instructor_id = $1)",
        "DELETE FROM reservations WHERE user_id = $1
            OR workshop_id IN (SELECT id FROM workshops WHERE instructor_id = $1)",
        "DELETE FROM workshop_lesson_requirements
            WHERE workshop_id IN (SELECT id FROM workshops WHERE instructor_id = $1)",
        "DELETE FROM workshops WHERE instructor_id = $1",
        "DELETE FROM quiz_submissions WHERE user_id = $1",
        "DELETE FROM progress WHERE user_id = $1",
        "DELETE FROM reviews WHERE user_id = $1",
        "DELETE FROM comments WHERE user_id = $1",
        "DELETE FROM certificates WHERE user_id = $1",
    ];
    for statement in statements {
        sqlx::query(statement).bind(user_id).execute(&mut **tx).await?;
    }
    crate::repositories::audit_logs::clear_actor(&mut **tx, user_id).await?;

    if crate::repositories::users::delete(&mut **tx, user_id).await? == 0 {
        return Err(DeletionError::NotFound);
    }
    Ok(())
}

/// Removes a course with its modules, lessons, quizzes and learner data.
/// Workshops linked to the course are kept and detached.
pub(crate) async fn delete_course(tx: &mut Tx<'_>, course_id: &str) -> Result<(), DeletionError> {
    let statements = [
        "DELETE FROM workshop_lesson_requirements
            WHERE lesson_id IN (SELECT id FROM lessons WHERE course_id = $1)",
        "UPDATE workshops SET course_id = NULL WHERE course_id = $1",
        "DELETE FROM comments WHERE lesson_id IN (SELECT id FROM lessons WHERE course_id = $1)",
        "DELETE FROM quiz_submissions WHERE quiz_id IN (
            SELECT q.id FROM quizzes q JOIN lessons l ON l.id = q.lesson_id WHERE l.course_id = $1)",
        "DELETE FROM quiz_options WHERE question_id IN (
            SELECT qq.id FROM quiz_questions qq
            JOIN quizzes q ON q.id = qq.quiz_id
            JOIN lessons l ON l.id = q.lesson_id
            WHERE l.course_id = $1)",
        "DELETE FROM quiz_questions WHERE quiz_id IN (
            SELECT q.id FROM quizzes q JOIN lessons l ON l.id = q.lesson_id WHERE l.course_id = $1)",
        "DELETE FROM quizzes WHERE lesson_id IN (SELECT id FROM lessons WHERE course_id = $1)",
        "DELETE FROM progress WHERE course_id = $1",
        "DELETE FROM reviews WHERE course_id = $1",
        "DELETE FROM certificates WHERE course_id = $1",
        "DELETE FROM lessons WHERE course_id = $1",
        "DELETE FROM course_modules WHERE course_id = $1",
    ];
    for statement in statements {
        sqlx::query(statement).bind(course_id).execute(&mut **tx).await?;
    }

    let result =
        sqlx::query("DELETE FROM courses WHERE id = $1").bind(course_id).execute(&mut **tx).await?;
    if result.rows_affected() == 0 {
        return Err(DeletionError::NotFound);
    }
    Ok(())
}
