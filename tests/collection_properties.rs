use std::collections::HashSet;

use proptest::prelude::*;
use proptest::test_runner::Config;
use quizwright::collection::{QuestionCollection, QuestionField, QuestionId};

#[derive(Debug, Clone)]
enum Op {
    Append,
    Update(usize, QuestionField, String),
    Remove(usize),
    /// Removes something that was already removed before, if anything was.
    RemoveAgain(usize),
}

fn field() -> impl Strategy<Value = QuestionField> {
    prop_oneof![
        Just(QuestionField::Text),
        Just(QuestionField::CorrectAnswer),
        Just(QuestionField::WrongAnswer),
        Just(QuestionField::Note),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Append),
        3 => (any::<usize>(), field(), "[a-z ]{0,12}").prop_map(|(i, f, v)| Op::Update(i, f, v)),
        2 => any::<usize>().prop_map(Op::Remove),
        1 => any::<usize>().prop_map(Op::RemoveAgain),
    ]
}

proptest! {
    #![proptest_config(Config::with_cases(128))]
    #[test]
    fn ids_stay_unique_and_ordered_by_insertion(ops in prop::collection::vec(op(), 0..64)) {
        let mut collection = QuestionCollection::new();
        let mut expected: Vec<QuestionId> = Vec::new();
        let mut removed: Vec<QuestionId> = Vec::new();

        for op in ops {
            match op {
                Op::Append => {
                    let id = collection.append();
                    prop_assert!(!expected.contains(&id));
                    prop_assert!(!removed.contains(&id));
                    expected.push(id);
                }
                Op::Update(i, field, value) if !expected.is_empty() => {
                    let id = expected[i % expected.len()];
                    prop_assert!(collection.update_field(id, field, value.clone()).is_ok());
                    let item = collection.get(id).unwrap();
                    prop_assert_eq!(item.field(field), value.as_str());
                    prop_assert!(!item.is_newly_added());
                }
                Op::Remove(i) if !expected.is_empty() => {
                    let id = expected.remove(i % expected.len());
                    prop_assert!(collection.remove(id).is_some());
                    removed.push(id);
                }
                Op::RemoveAgain(i) if !removed.is_empty() => {
                    let id = removed[i % removed.len()];
                    prop_assert!(collection.remove(id).is_none());
                }
                _ => {}
            }

            let ids: Vec<QuestionId> = collection.ids().collect();
            let unique: HashSet<QuestionId> = ids.iter().copied().collect();
            prop_assert_eq!(unique.len(), ids.len());
            prop_assert_eq!(&ids, &expected);
        }
    }
}
