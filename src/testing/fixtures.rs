use serde_json::{Value, json};

/// Fifteen predictions split into four groups of sizes 5, 5, 4 and 1.
pub const GROUPED_PREDICTIONS: [&str; 15] = [
    "A B", "BC D", "C", "123", "BCD", "10", "  BD", "AB", "I am a dog", "AB C", "AB 1", "GMA", "0.123", "BD",
    "abc",
];

pub const GROUPED_REFERENCES: &[&[&str]] = &[
    &["B", "AB", "A"],
    &["A", "BC D", "BC DF"],
    &["c", " C"],
    &["13", "23", "234"],
    &["  ", " BD", " BDA"],
    &["1", "10", "100"],
    &["A", "B", "BD"],
    &["ABC", "ab", "BC"],
    &["I am a person", "I AM A DOG", "ABC"],
    &["AB CD", "AB", "ab"],
    &["AB 1", "AB1"],
    &[" GMA 123", "GMA"],
    &["123", "0.12"],
    &["BDE", "BCE", "bdefs"],
    &[" abcdefg", "AB", "abcd"],
];

const GROUP_SIZES: [usize; 4] = [5, 5, 4, 1];

/// `task_data` for the grouped fixture: the first member of every group is
/// the `original` variant, the rest are paraphrases.
pub fn grouped_task_data() -> Value {
    let rows: Vec<Value> = GROUP_SIZES
        .iter()
        .enumerate()
        .flat_map(|(group, &size)| {
            (0..size).map(move |member| {
                let variant = if member == 0 { "original" } else { "paraphrase" };
                json!({"group_id": format!("group{}", group + 1), "variant_type": variant})
            })
        })
        .collect();
    Value::Array(rows)
}
