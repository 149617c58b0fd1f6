use std::fmt;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::database::quiz::{AnswerPayload, QuestionPayload};
use crate::error::WizardError;
use crate::generation::RawQuestion;

/// Identity of a question inside an authoring session.
///
/// Always minted locally; ids coming from the generation API are never used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuestionId(Uuid);

impl QuestionId {
    fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionField {
    Text,
    CorrectAnswer,
    WrongAnswer,
    Note,
}

impl QuestionField {
    pub fn label(&self) -> &'static str {
        match self {
            QuestionField::Text => "question",
            QuestionField::CorrectAnswer => "correct answer",
            QuestionField::WrongAnswer => "wrong answer",
            QuestionField::Note => "note",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionItem {
    id: QuestionId,
    text: String,
    correct_answer: String,
    wrong_answer: String,
    note: String,
    is_newly_added: bool,
}

impl fmt::Display for QuestionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let blank = |s: &str| if s.is_empty() { "…" } else { s }.to_owned();
        write!(
            f,
            "{}\n  ✅ {}\n  ❌ {}",
            blank(&self.text),
            blank(&self.correct_answer),
            blank(&self.wrong_answer)
        )?;
        if !self.note.is_empty() {
            write!(f, "\n  💡 {}", self.note)?;
        }
        Ok(())
    }
}

impl QuestionItem {
    fn blank() -> Self {
        Self {
            id: QuestionId::fresh(),
            text: String::new(),
            correct_answer: String::new(),
            wrong_answer: String::new(),
            note: String::new(),
            is_newly_added: true,
        }
    }

    /// Builds an item from a generated question, tolerating short or
    /// inconsistent option lists.
    pub fn from_raw(raw: RawQuestion) -> Self {
        let has_options = raw.options.as_ref().is_some_and(|opts| !opts.is_empty());
        let mut options = raw.options.unwrap_or_default().into_iter();
        let first = options.next().unwrap_or_default();
        let second = options.next().unwrap_or_default();

        let (correct_answer, wrong_answer) = match raw.correct_answer {
            Some(correct) if !correct.is_empty() && correct == first => (first, second),
            Some(correct) if !correct.is_empty() && correct == second => (second, first),
            _ if has_options => (second, first),
            correct => (correct.unwrap_or_default(), String::new()),
        };

        Self {
            id: QuestionId::fresh(),
            text: raw.text.unwrap_or_default(),
            correct_answer,
            wrong_answer,
            note: raw.note.unwrap_or_default(),
            is_newly_added: false,
        }
    }

    pub fn id(&self) -> QuestionId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    pub fn wrong_answer(&self) -> &str {
        &self.wrong_answer
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn is_newly_added(&self) -> bool {
        self.is_newly_added
    }

    pub fn field(&self, field: QuestionField) -> &str {
        match field {
            QuestionField::Text => &self.text,
            QuestionField::CorrectAnswer => &self.correct_answer,
            QuestionField::WrongAnswer => &self.wrong_answer,
            QuestionField::Note => &self.note,
        }
    }

    /// Projects the item into its stored shape, or `None` when it is not
    /// complete enough to be saved.
    pub fn to_payload(&self) -> Option<QuestionPayload> {
        let text = self.text.trim();
        let correct = self.correct_answer.trim();
        let wrong = self.wrong_answer.trim();

        if text.is_empty() || correct.is_empty() {
            return None;
        }

        let answer = if is_true_false_pair(correct, wrong) {
            AnswerPayload::Boolean {
                correct_answer: correct.eq_ignore_ascii_case("true"),
            }
        } else if !wrong.is_empty() {
            AnswerPayload::MultipleChoice {
                correct_answer: correct.to_owned(),
                options: [correct.to_owned(), wrong.to_owned()],
            }
        } else {
            return None;
        };

        Some(QuestionPayload {
            text: text.to_owned(),
            note: self.note.trim().to_owned(),
            answer,
        })
    }
}

fn is_true_false_pair(correct: &str, wrong: &str) -> bool {
    (correct.eq_ignore_ascii_case("true") && wrong.eq_ignore_ascii_case("false"))
        || (correct.eq_ignore_ascii_case("false") && wrong.eq_ignore_ascii_case("true"))
}

/// The editable, insertion-ordered list of questions of one session.
#[derive(Debug, Clone, Default)]
pub struct QuestionCollection {
    items: IndexMap<QuestionId, QuestionItem>,
    scroll_requested: bool,
}

impl QuestionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: QuestionId) -> Option<&QuestionItem> {
        self.items.get(&id)
    }

    /// Position-based lookup, for display numbering only.
    pub fn nth(&self, index: usize) -> Option<&QuestionItem> {
        self.items.get_index(index).map(|(_, item)| item)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QuestionItem> {
        self.items.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = QuestionId> + '_ {
        self.items.keys().copied()
    }

    pub fn append(&mut self) -> QuestionId {
        let item = QuestionItem::blank();
        let id = item.id;
        self.items.insert(id, item);
        self.scroll_requested = true;
        id
    }

    /// Returns `true` once after each `append`.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }

    pub fn update_field(
        &mut self,
        id: QuestionId,
        field: QuestionField,
        value: impl Into<String>,
    ) -> Result<(), WizardError> {
        let item = self
            .items
            .get_mut(&id)
            .ok_or(WizardError::QuestionNotFound(id))?;
        let value = value.into();
        match field {
            QuestionField::Text => item.text = value,
            QuestionField::CorrectAnswer => item.correct_answer = value,
            QuestionField::WrongAnswer => item.wrong_answer = value,
            QuestionField::Note => item.note = value,
        }
        item.is_newly_added = false;
        Ok(())
    }

    pub fn remove(&mut self, id: QuestionId) -> Option<QuestionItem> {
        self.items.shift_remove(&id)
    }

    /// Eligible questions in display order. The collection itself is left
    /// untouched; incomplete cards simply do not make it into the payload.
    pub fn validate_for_save(&self) -> Vec<QuestionPayload> {
        self.items.values().filter_map(QuestionItem::to_payload).collect()
    }

    pub(crate) fn replace_all(&mut self, items: impl IntoIterator<Item = QuestionItem>) {
        self.items = items.into_iter().map(|item| (item.id, item)).collect();
        self.scroll_requested = false;
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.scroll_requested = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(text: &str, correct: &str, wrong: &str) -> (QuestionCollection, QuestionId) {
        let mut collection = QuestionCollection::new();
        let id = collection.append();
        collection.update_field(id, QuestionField::Text, text).unwrap();
        collection
            .update_field(id, QuestionField::CorrectAnswer, correct)
            .unwrap();
        collection
            .update_field(id, QuestionField::WrongAnswer, wrong)
            .unwrap();
        (collection, id)
    }

    #[test]
    fn append_adds_blank_item_at_the_end() {
        let mut collection = QuestionCollection::new();
        let first = collection.append();
        let second = collection.append();

        assert_eq!(collection.ids().collect::<Vec<_>>(), vec![first, second]);
        let item = collection.get(second).unwrap();
        assert!(item.is_newly_added());
        assert_eq!(item.text(), "");
        assert_eq!(item.correct_answer(), "");
    }

    #[test]
    fn scroll_request_fires_once_per_append() {
        let mut collection = QuestionCollection::new();
        assert!(!collection.take_scroll_request());

        collection.append();
        assert!(collection.take_scroll_request());
        assert!(!collection.take_scroll_request());
    }

    #[test]
    fn update_clears_new_flag() {
        let mut collection = QuestionCollection::new();
        let id = collection.append();
        collection
            .update_field(id, QuestionField::Note, "because")
            .unwrap();

        let item = collection.get(id).unwrap();
        assert!(!item.is_newly_added());
        assert_eq!(item.note(), "because");
    }

    #[test]
    fn update_unknown_id_is_an_error() {
        let mut other = QuestionCollection::new();
        let foreign = other.append();
        let mut collection = QuestionCollection::new();

        let err = collection
            .update_field(foreign, QuestionField::Text, "x")
            .unwrap_err();
        assert!(matches!(err, WizardError::QuestionNotFound(id) if id == foreign));
    }

    #[test]
    fn remove_is_idempotent_and_keeps_order() {
        let mut collection = QuestionCollection::new();
        let a = collection.append();
        let b = collection.append();
        let c = collection.append();

        assert!(collection.remove(b).is_some());
        assert!(collection.remove(b).is_none());
        assert_eq!(collection.ids().collect::<Vec<_>>(), vec![a, c]);
    }

    #[test]
    fn true_false_pair_is_boolean_question() {
        let (collection, _) = filled("Q", "True", "False");
        let payload = collection.validate_for_save();

        assert_eq!(payload.len(), 1);
        assert_eq!(
            payload[0].answer,
            AnswerPayload::Boolean {
                correct_answer: true
            }
        );
    }

    #[test]
    fn lowercase_true_false_is_eligible_even_with_wrong_set() {
        let (collection, _) = filled("Is water wet?", "true", "false");
        assert_eq!(collection.validate_for_save().len(), 1);
    }

    #[test]
    fn multiple_choice_needs_second_option() {
        let (collection, _) = filled("Capital of France?", "Paris", "");
        assert!(collection.validate_for_save().is_empty());

        let (collection, _) = filled("Capital of France?", " Paris ", "London");
        let payload = collection.validate_for_save();
        assert_eq!(
            payload[0].answer,
            AnswerPayload::MultipleChoice {
                correct_answer: "Paris".into(),
                options: ["Paris".into(), "London".into()],
            }
        );
    }

    #[test]
    fn blank_items_are_dropped_but_kept_in_collection() {
        let (mut collection, _) = filled("Q", "True", "False");
        collection.append();

        assert_eq!(collection.validate_for_save().len(), 1);
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn raw_question_with_matching_correct_answer() {
        let item = QuestionItem::from_raw(RawQuestion {
            text: Some("Capital?".into()),
            options: Some(vec!["Paris".into(), "London".into()]),
            correct_answer: Some("Paris".into()),
            note: Some("It is Paris.".into()),
        });

        assert_eq!(item.correct_answer(), "Paris");
        assert_eq!(item.wrong_answer(), "London");
        assert_eq!(item.note(), "It is Paris.");
        assert!(!item.is_newly_added());
    }

    #[test]
    fn raw_question_with_unknown_correct_answer_uses_second_option() {
        let item = QuestionItem::from_raw(RawQuestion {
            text: Some("When?".into()),
            options: Some(vec!["1814".into(), "1808".into()]),
            correct_answer: Some("True".into()),
            note: None,
        });

        assert_eq!(item.correct_answer(), "1808");
        assert_eq!(item.wrong_answer(), "1814");
    }

    #[test]
    fn raw_question_with_short_options_pads_with_empty() {
        let item = QuestionItem::from_raw(RawQuestion {
            text: Some("Only one?".into()),
            options: Some(vec!["Yes".into()]),
            correct_answer: Some("Yes".into()),
            note: None,
        });
        assert_eq!(item.correct_answer(), "Yes");
        assert_eq!(item.wrong_answer(), "");

        let item = QuestionItem::from_raw(RawQuestion {
            text: None,
            options: None,
            correct_answer: Some("Paris".into()),
            note: None,
        });
        assert_eq!(item.text(), "");
        assert_eq!(item.correct_answer(), "Paris");
        assert_eq!(item.wrong_answer(), "");
    }
}
