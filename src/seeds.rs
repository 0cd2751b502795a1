//! Seed data: a built-in exercise set so the service is usable without any
//! external config.

use crate::domain::{AnswerOption, ArrangementSpec, ExerciseSet, Question, QuestionType};

fn opt(id: &str, text: &str, is_correct: bool, position: u32) -> AnswerOption {
  AnswerOption { id: id.into(), text: text.into(), is_correct, position, is_blank_word: false }
}

fn tile(id: &str, text: &str, position: u32, is_blank_word: bool) -> AnswerOption {
  // Arrangement tiles reuse the option row; is_correct mirrors the blank
  // flag so scoring treats distractors uniformly.
  AnswerOption { id: id.into(), text: text.into(), is_correct: is_blank_word, position, is_blank_word }
}

/// Minimal built-in content that keeps the app useful even without an
/// exercise bank in the TOML config.
pub fn seed_exercise_sets() -> Vec<ExerciseSet> {
  vec![ExerciseSet {
    id: "set-demo".into(),
    class_id: "class-demo".into(),
    creator_id: "seed".into(),
    title: "Spanish basics".into(),
    shuffle_questions: false,
    max_attempts: None,
    questions: vec![
      Question {
        id: "q-demo-1".into(),
        text: "Elige la forma correcta: Yo ___ café por la mañana.".into(),
        kind: QuestionType::MultipleChoice,
        points: 2,
        position: 0,
        arrangement: None,
        options: vec![
          opt("q-demo-1-o1", "bebo", true, 0),
          opt("q-demo-1-o2", "bebes", false, 1),
          opt("q-demo-1-o3", "beber", false, 2),
        ],
      },
      Question {
        id: "q-demo-2".into(),
        text: "«La mano» es un sustantivo femenino.".into(),
        kind: QuestionType::TrueFalse,
        points: 1,
        position: 1,
        arrangement: None,
        options: vec![
          opt("q-demo-2-o1", "Verdadero", true, 0),
          opt("q-demo-2-o2", "Falso", false, 1),
        ],
      },
      Question {
        id: "q-demo-3".into(),
        text: "Ordena las palabras: fui / ayer / al / mercado".into(),
        kind: QuestionType::SentenceArrangement,
        points: 3,
        position: 2,
        arrangement: Some(ArrangementSpec { complete_sentence: "Ayer fui al mercado.".into() }),
        options: vec![
          tile("q-demo-3-t1", "Ayer", 0, true),
          tile("q-demo-3-t2", "fui", 1, true),
          tile("q-demo-3-t3", "al", 2, true),
          tile("q-demo-3-t4", "mercado", 3, true),
          tile("q-demo-3-t5", "fue", 4, false),
          tile("q-demo-3-t6", "tienda", 5, false),
        ],
      },
      Question {
        id: "q-demo-4".into(),
        text: "Escribe un párrafo corto sobre tu ciudad.".into(),
        kind: QuestionType::Essay,
        points: 10,
        position: 3,
        arrangement: None,
        options: vec![],
      },
    ],
  }]
}
