use std::collections::{HashMap, HashSet};

use crate::db::models::QuizOption;

/// Correct option ids per question id.
pub(crate) fn answer_key(options: &[QuizOption]) -> HashMap<String, HashSet<String>> {
    let mut key: HashMap<String, HashSet<String>> = HashMap::new();
    for option in options {
        let entry = key.entry(option.question_id.clone()).or_default();
        if option.is_correct {
            entry.insert(option.id.clone());
        }
    }
    key
}

/// Percentage (0..=100, rounded) of questions whose chosen option set equals
/// the correct set exactly. A quiz without questions scores 100.
pub(crate) fn score(
    answer_key: &HashMap<String, HashSet<String>>,
    answers: &HashMap<String, Vec<String>>,
) -> i32 {
    if answer_key.is_empty() {
        return 100;
    }

    let correct = answer_key
        .iter()
        .filter(|(question_id, expected)| {
            let chosen: HashSet<String> = answers
                .get(*question_id)
                .map(|ids| ids.iter().cloned().collect())
                .unwrap_or_default();
            !chosen.is_empty() && chosen == **expected
        })
        .count();

    ((correct as f64 * 100.0) / answer_key.len() as f64).round() as i32
}
