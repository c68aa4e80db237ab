use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::core::time::format_primitive;
use crate::db::models::{Quiz, QuizOption, QuizQuestion, QuizSubmission};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuizUpsert {
    #[serde(default)]
    #[serde(alias = "passingScore")]
    #[validate(range(min = 0, max = 100, message = "passing_score must be between 0 and 100"))]
    pub(crate) passing_score: Option<i32>,
    #[serde(default)]
    pub(crate) randomized: bool,
    #[validate(length(max = 200, message = "too many questions"), nested)]
    pub(crate) questions: Vec<QuestionInput>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_question_options"))]
pub(crate) struct QuestionInput {
    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub(crate) prompt: String,
    #[validate(length(min = 2, max = 20, message = "a question needs 2-20 options"))]
    pub(crate) options: Vec<OptionInput>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct OptionInput {
    pub(crate) text: String,
    #[serde(default)]
    #[serde(alias = "isCorrect")]
    pub(crate) is_correct: bool,
}

fn validate_question_options(question: &QuestionInput) -> Result<(), ValidationError> {
    if question.options.iter().any(|option| option.text.trim().is_empty()) {
        let mut error = ValidationError::new("empty_option");
        error.message = Some("option text must not be empty".into());
        return Err(error);
    }
    if !question.options.iter().any(|option| option.is_correct) {
        let mut error = ValidationError::new("no_correct_option");
        error.message = Some("each question needs at least one correct option".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuizSubmitRequest {
    /// Question id to chosen option ids.
    #[serde(default)]
    pub(crate) answers: HashMap<String, Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuizResponse {
    pub(crate) id: String,
    pub(crate) lesson_id: String,
    pub(crate) passing_score: Option<i32>,
    pub(crate) randomized: bool,
    pub(crate) questions: Vec<QuestionResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) prompt: String,
    pub(crate) options: Vec<OptionResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OptionResponse {
    pub(crate) id: String,
    pub(crate) text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) is_correct: Option<bool>,
}

impl QuizResponse {
    /// Groups options under their questions. `reveal_answers` controls the `isCorrect` flags.
    pub(crate) fn build(
        quiz: Quiz,
        questions: Vec<QuizQuestion>,
        options: Vec<QuizOption>,
        reveal_answers: bool,
    ) -> Self {
        let mut by_question: HashMap<String, Vec<OptionResponse>> = HashMap::new();
        for option in options {
            by_question.entry(option.question_id).or_default().push(OptionResponse {
                id: option.id,
                text: option.text,
                is_correct: reveal_answers.then_some(option.is_correct),
            });
        }

        let questions = questions
            .into_iter()
            .map(|question| QuestionResponse {
                options: by_question.remove(&question.id).unwrap_or_default(),
                id: question.id,
                prompt: question.prompt,
            })
            .collect();

        Self {
            id: quiz.id,
            lesson_id: quiz.lesson_id,
            passing_score: quiz.passing_score,
            randomized: quiz.randomized,
            questions,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionResponse {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) score: i32,
    pub(crate) submitted_at: String,
}

impl SubmissionResponse {
    pub(crate) fn from_db(submission: QuizSubmission) -> Self {
        Self {
            id: submission.id,
            quiz_id: submission.quiz_id,
            score: submission.score,
            submitted_at: format_primitive(submission.submitted_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionResult {
    pub(crate) submission: SubmissionResponse,
    pub(crate) passed: bool,
    pub(crate) lesson_completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn question_without_correct_option_is_rejected() {
        let payload: QuizUpsert = serde_json::from_value(json!({
            "passingScore": 60,
            "questions": [{
                "prompt": "Which fat browns first?",
                "options": [{"text": "Butter"}, {"text": "Lard"}]
            }]
        }))
        .unwrap();

        assert!(payload.validate().is_err());
    }

    #[test]
    fn passing_score_out_of_range_is_rejected() {
        let payload: QuizUpsert =
            serde_json::from_value(json!({"passing_score": 120, "questions": []})).unwrap();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn option_count_is_checked_per_question() {
        let single: QuizUpsert = serde_json::from_value(json!({
            "questions": [{
                "prompt": "Salt the pasta water?",
                "options": [{"text": "Yes", "isCorrect": true}]
            }]
        }))
        .unwrap();
        assert!(single.validate().is_err());

        let pair: QuizUpsert = serde_json::from_value(json!({
            "questions": [{
                "prompt": "Salt the pasta water?",
                "options": [{"text": "Yes", "isCorrect": true}, {"text": "No"}]
            }]
        }))
        .unwrap();
        assert!(pair.validate().is_ok());
    }
}
