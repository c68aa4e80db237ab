use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rand::seq::SliceRandom;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::api::lessons::load_lesson;
use crate::api::progress::map_gate_error;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::repositories::quizzes::{NewOption, NewQuestion};
use crate::schemas::quiz::{
    QuizResponse, QuizSubmitRequest, QuizUpsert, SubmissionResponse, SubmissionResult,
};
use crate::services::{progress_gate, quiz_scoring};

pub(crate) async fn get_quiz(
    Path(lesson_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<QuizResponse>, ApiError> {
    let access = load_lesson(&state, &lesson_id, &user).await?;
    let quiz = repositories::quizzes::find_by_lesson(state.db(), &access.lesson.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load quiz"))?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))?;

    let questions = repositories::quizzes::list_questions(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load quiz questions"))?;
    let options = repositories::quizzes::list_options(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load quiz options"))?;

    let randomized = quiz.randomized;
    let mut response = QuizResponse::build(quiz, questions, options, access.manager);
    if randomized && !access.manager {
        response.questions.shuffle(&mut rand::thread_rng());
    }

    Ok(Json(response))
}

pub(crate) async fn replace_quiz(
    Path(lesson_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<QuizUpsert>,
) -> Result<Json<QuizResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let access = load_lesson(&state, &lesson_id, &user).await?;
    if !access.manager {
        return Err(ApiError::Forbidden("Not enough permissions"));
    }

    let questions: Vec<NewQuestion> = payload
        .questions
        .into_iter()
        .map(|question| NewQuestion {
            prompt: question.prompt.trim().to_string(),
            options: question
                .options
                .into_iter()
                .map(|option| NewOption {
                    text: option.text.trim().to_string(),
                    is_correct: option.is_correct,
                })
                .collect(),
        })
        .collect();

    let mut tx =
        state.db().begin().await.map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;
    let quiz = repositories::quizzes::replace_for_lesson(
        &mut tx,
        &access.lesson.id,
        payload.passing_score,
        payload.randomized,
        &questions,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to save quiz"))?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit quiz"))?;

    tracing::info!(
        quiz_id = %quiz.id,
        lesson_id = %access.lesson.id,
        questions = questions.len(),
        "Quiz replaced"
    );

    let stored_questions = repositories::quizzes::list_questions(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load quiz questions"))?;
    let stored_options = repositories::quizzes::list_options(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load quiz options"))?;

    Ok(Json(QuizResponse::build(quiz, stored_questions, stored_options, true)))
}

/// Scores an attempt. A passing attempt also marks the lesson complete.
pub(crate) async fn submit_quiz(
    Path(lesson_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<QuizSubmitRequest>,
) -> Result<(StatusCode, Json<SubmissionResult>), ApiError> {
    let access = load_lesson(&state, &lesson_id, &user).await?;
    let quiz = repositories::quizzes::find_by_lesson(state.db(), &access.lesson.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load quiz"))?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))?;

    let options = repositories::quizzes::list_options(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load quiz options"))?;
    let answer_key = quiz_scoring::answer_key(&options);
    let score = quiz_scoring::score(&answer_key, &payload.answers);

    let answers = serde_json::to_value(&payload.answers)
        .map_err(|e| ApiError::internal(e, "Failed to encode answers"))?;
    let submission = repositories::quizzes::create_submission(
        state.db(),
        &quiz.id,
        &user.id,
        score,
        answers,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to store submission"))?;

    let passed = progress_gate::quiz_passed(
        quiz.passing_score,
        &[progress_gate::Attempt { score, submitted_at: submission.submitted_at }],
        state.settings().progress().quiz_pass_policy,
    );

    let lesson_completed = if passed {
        progress_gate::set_completion(
            state.db(),
            &user.id,
            &access.course.id,
            &access.lesson.id,
            true,
            None,
            state.settings().progress().quiz_pass_policy,
        )
        .await
        .map_err(map_gate_error)?;
        true
    } else {
        false
    };

    tracing::info!(
        quiz_id = %quiz.id,
        user_id = %user.id,
        score,
        passed,
        "Quiz submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmissionResult {
            submission: SubmissionResponse::from_db(submission),
            passed,
            lesson_completed,
        }),
    ))
}
