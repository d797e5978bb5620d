//! Random reordering of questions and their options.

use rand::Rng;

use crate::model::Question;

/// Fisher–Yates shuffle: walks from the last position down, swapping each
/// with a uniformly chosen position at or before it.
#[must_use]
pub fn shuffle<T, R: Rng>(mut items: Vec<T>, rng: &mut R) -> Vec<T> {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
    items
}

/// Shuffle a question's options, keeping its correct pointer on the same option.
#[must_use]
pub fn shuffle_options<R: Rng>(question: &Question, rng: &mut R) -> Question {
    let order = shuffle((0..question.options().len()).collect::<Vec<usize>>(), rng);
    question.with_option_order(&order)
}

/// Shuffle question order, then the options inside every question.
#[must_use]
pub fn shuffle_questions<R: Rng>(questions: &[Question], rng: &mut R) -> Vec<Question> {
    shuffle(questions.to_vec(), rng)
        .into_iter()
        .map(|question| shuffle_options(&question, rng))
        .collect()
}
