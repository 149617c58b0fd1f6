use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Characters the store does not accept in a key.
const RESERVED_KEY_CHARS: [char; 5] = ['.', '#', '$', '[', ']'];

/// Storage key of a quiz, derived from its title.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuizId(String);

impl QuizId {
    pub fn from_title(title: &str) -> Self {
        Self(
            title
                .trim()
                .chars()
                .map(|c| if RESERVED_KEY_CHARS.contains(&c) { '_' } else { c })
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuizId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is saving the quiz. Only read at save time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub user_id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizPayload {
    #[serde(rename = "quizTitle")]
    pub title: String,
    pub description: String,
    pub language: String,
    #[serde(rename = "gradeLevel")]
    pub grade_level: Option<u32>,
    pub questions: Vec<QuestionPayload>,
    pub user_generated: bool,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userFullName")]
    pub user_full_name: String,
    #[serde(rename = "createdAt", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPayload {
    pub text: String,
    pub note: String,
    #[serde(flatten)]
    pub answer: AnswerPayload,
}

/// True/false questions store a boolean and no options; everything else is
/// a two-option multiple choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerPayload {
    MultipleChoice {
        correct_answer: String,
        options: [String; 2],
    },
    Boolean {
        correct_answer: bool,
    },
}

/// What the store hands back after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveConfirmation {
    pub quiz_id: QuizId,
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_trimmed_and_reserved_chars_replaced() {
        assert_eq!(QuizId::from_title("  Chapter 1.2 #intro  ").as_str(), "Chapter 1_2 _intro");
        assert_eq!(QuizId::from_title("a$b[c]d").as_str(), "a_b_c_d");
        assert_eq!(QuizId::from_title("Photosynthesis").as_str(), "Photosynthesis");
    }

    #[test]
    fn payload_serializes_answer_shapes() {
        let payload = QuizPayload {
            title: "Plants".into(),
            description: "Plants".into(),
            language: "en".into(),
            grade_level: Some(7),
            questions: vec![
                QuestionPayload {
                    text: "Do plants need light?".into(),
                    note: String::new(),
                    answer: AnswerPayload::Boolean {
                        correct_answer: true,
                    },
                },
                QuestionPayload {
                    text: "What do leaves absorb?".into(),
                    note: "Mostly carbon dioxide.".into(),
                    answer: AnswerPayload::MultipleChoice {
                        correct_answer: "CO2".into(),
                        options: ["CO2".into(), "Helium".into()],
                    },
                },
            ],
            user_generated: true,
            user_id: "42".into(),
            user_full_name: "Anonymous".into(),
            created_at: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["quizTitle"], "Plants");
        assert_eq!(json["gradeLevel"], 7);
        assert_eq!(json["userId"], "42");
        assert_eq!(json["createdAt"], 1_700_000_000_000_i64);
        assert_eq!(json["user_generated"], true);
        assert_eq!(json["questions"][0]["correct_answer"], true);
        assert!(json["questions"][0].get("options").is_none());
        assert_eq!(json["questions"][1]["correct_answer"], "CO2");
        assert_eq!(json["questions"][1]["options"][1], "Helium");

        let back: QuizPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }
}
