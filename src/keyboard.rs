use teloxide::types::{KeyboardButton, KeyboardMarkup};

use crate::collection::{QuestionCollection, QuestionField};

pub(crate) const CREATE_QUIZ: &str = "Create a new quiz🏗️";
pub(crate) const GENERATE: &str = "Generate✨";
pub(crate) const REGENERATE: &str = "Regenerate🔄";
pub(crate) const REVIEW: &str = "Review Q&A👀";
pub(crate) const FINALIZE: &str = "Finalize✅";
pub(crate) const BACK: &str = "Back⬅️";
pub(crate) const ADD_QUESTION: &str = "Add question➕";
pub(crate) const EDIT_QUESTION: &str = "Edit question✏️";
pub(crate) const DELETE_QUESTION: &str = "Delete question🗑️";
pub(crate) const CHANGE_TITLE: &str = "Change title";
pub(crate) const ADD_DESCRIPTION: &str = "Add description";
pub(crate) const SAVE_QUIZ: &str = "Save quiz💾";
pub(crate) const CREATE_ANOTHER: &str = "Create another🔁";

/// Longest question text shown on a selection button.
const LABEL_CHARS: usize = 40;

pub(crate) fn action_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(CREATE_QUIZ)]])
}

pub(crate) fn content_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(GENERATE)]])
}

/// Step 2 keyboard; the dual view still offers step-1 actions.
pub(crate) fn review_keyboard(review_mode: bool) -> KeyboardMarkup {
    let keyboard = if review_mode {
        vec![
            vec![
                KeyboardButton::new(ADD_QUESTION),
                KeyboardButton::new(EDIT_QUESTION),
            ],
            vec![KeyboardButton::new(FINALIZE)],
            vec![KeyboardButton::new(BACK)],
        ]
    } else {
        vec![
            vec![
                KeyboardButton::new(REGENERATE),
                KeyboardButton::new(REVIEW),
            ],
            vec![KeyboardButton::new(BACK)],
        ]
    };

    KeyboardMarkup::new(keyboard)
}

pub(crate) fn questions_keyboard(questions: &QuestionCollection) -> KeyboardMarkup {
    let keyboard = questions
        .iter()
        .enumerate()
        .map(|(idx, question)| vec![KeyboardButton::new(question_label(idx, question.text()))])
        .chain(std::iter::once(vec![KeyboardButton::new(BACK)]));

    KeyboardMarkup::new(keyboard)
}

/// `"3. What is the capital…"`; the leading number is what selection parses.
pub(crate) fn question_label(idx: usize, text: &str) -> String {
    let text = if text.is_empty() { "(empty)" } else { text };
    let mut label: String = text.chars().take(LABEL_CHARS).collect();
    if text.chars().count() > LABEL_CHARS {
        label.push('…');
    }
    format!("{}. {}", idx + 1, label)
}

/// Position encoded by [`question_label`], if `label` looks like one.
pub(crate) fn parse_question_label(label: &str) -> Option<usize> {
    let (number, _) = label.split_once('.')?;
    number.trim().parse::<usize>().ok()?.checked_sub(1)
}

pub(crate) fn edit_question_keyboard() -> KeyboardMarkup {
    let keyboard = vec![
        vec![
            KeyboardButton::new(field_button(QuestionField::Text)),
            KeyboardButton::new(field_button(QuestionField::Note)),
        ],
        vec![
            KeyboardButton::new(field_button(QuestionField::CorrectAnswer)),
            KeyboardButton::new(field_button(QuestionField::WrongAnswer)),
        ],
        vec![KeyboardButton::new(DELETE_QUESTION)],
        vec![KeyboardButton::new(BACK)],
    ];

    KeyboardMarkup::new(keyboard)
}

pub(crate) fn field_button(field: QuestionField) -> String {
    format!("Edit {}", field.label())
}

pub(crate) fn parse_field_button(text: &str) -> Option<QuestionField> {
    [
        QuestionField::Text,
        QuestionField::CorrectAnswer,
        QuestionField::WrongAnswer,
        QuestionField::Note,
    ]
    .into_iter()
    .find(|field| field_button(*field) == text)
}

pub(crate) fn back_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(BACK)]])
}

pub(crate) fn metadata_keyboard() -> KeyboardMarkup {
    let keyboard = vec![
        vec![
            KeyboardButton::new(CHANGE_TITLE),
            KeyboardButton::new(ADD_DESCRIPTION),
        ],
        vec![KeyboardButton::new(SAVE_QUIZ)],
        vec![KeyboardButton::new(BACK)],
    ];

    KeyboardMarkup::new(keyboard)
}

pub(crate) fn completion_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(CREATE_ANOTHER)]])
}
