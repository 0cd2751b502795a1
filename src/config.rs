//! Loading application configuration (prompts + optional exercise bank) from TOML.
//!
//! See `AppConfig` and `Prompts` for the expected schema.

use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{AnswerOption, ArrangementSpec, ExerciseSet, Question, QuestionType};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub exercise_sets: Vec<ExerciseSetCfg>,
}

/// Exercise set entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ExerciseSetCfg {
  #[serde(default)] pub id: Option<String>,
  #[serde(default)] pub class_id: Option<String>,
  #[serde(default)] pub creator_id: Option<String>,
  pub title: String,
  #[serde(default)] pub shuffle_questions: bool,
  #[serde(default)] pub max_attempts: Option<u32>,
  #[serde(default)] pub questions: Vec<QuestionCfg>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QuestionCfg {
  #[serde(default)] pub id: Option<String>,
  pub text: String,
  pub kind: QuestionType,
  #[serde(default = "default_points")] pub points: u32,
  /// Sentence arrangement only: the full target sentence.
  #[serde(default)] pub complete_sentence: Option<String>,
  #[serde(default)] pub options: Vec<OptionCfg>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OptionCfg {
  pub text: String,
  #[serde(default)] pub correct: bool,
  #[serde(default)] pub blank_word: bool,
}

fn default_points() -> u32 { 1 }

impl ExerciseSetCfg {
  /// Convert a bank entry into a domain set. Questions that cannot be
  /// scored (no correct option on a choice question) are skipped with a log
  /// line rather than failing the whole bank.
  pub fn into_exercise_set(self) -> ExerciseSet {
    let set_id = self.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut questions = Vec::new();
    for (qi, q) in self.questions.into_iter().enumerate() {
      let qid = q.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
      let needs_correct_option = matches!(q.kind, QuestionType::MultipleChoice | QuestionType::TrueFalse);
      if needs_correct_option && !q.options.iter().any(|o| o.correct) {
        error!(target: "aula_backend", set = %set_id, question = %qid, "Skipping bank question: no correct option.");
        continue;
      }
      if q.kind == QuestionType::SentenceArrangement && q.complete_sentence.is_none() {
        error!(target: "aula_backend", set = %set_id, question = %qid, "Skipping bank question: missing complete_sentence.");
        continue;
      }
      let options = q
        .options
        .into_iter()
        .enumerate()
        .map(|(oi, o)| AnswerOption {
          id: format!("{}-o{}", qid, oi + 1),
          text: o.text,
          is_correct: o.correct,
          position: oi as u32,
          is_blank_word: o.blank_word,
        })
        .collect();
      questions.push(Question {
        id: qid,
        text: q.text,
        kind: q.kind,
        points: q.points,
        position: qi as u32,
        arrangement: q.complete_sentence.map(|s| ArrangementSpec { complete_sentence: s }),
        options,
      });
    }
    ExerciseSet {
      id: set_id,
      class_id: self.class_id.unwrap_or_else(|| "default".into()),
      creator_id: self.creator_id.unwrap_or_else(|| "bank".into()),
      title: self.title,
      shuffle_questions: self.shuffle_questions,
      max_attempts: self.max_attempts,
      questions,
    }
  }
}

/// Prompt templates used for feedback generation. Defaults are sensible for
/// Spanish tutoring; override them in TOML to tune tone or structure.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  // Compact single-concept feedback (multiple choice, true/false)
  pub feedback_system: String,
  pub feedback_user_template: String,
  // Essay rubric feedback
  pub essay_system: String,
  pub essay_user_template: String,
  // Sentence arrangement feedback
  pub arrangement_system: String,
  pub arrangement_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      feedback_system: "You are a supportive Spanish tutor. Respond ONLY with strict JSON: {\"feedback_text\": string, \"explanation\": string}. feedback_text is at most 40 words; explanation is at most 120 words. Explain the single concept the question tests. Never include links or URLs.".into(),
      feedback_user_template: "Question: {question}\nStudent answer: {student_answer}\nCorrect answer: {correct_answer}\nThe student answered {result}. Give encouraging feedback and explain why the correct answer is right.".into(),
      essay_system: "You are a strict but encouraging Spanish writing tutor. Respond ONLY with strict JSON: {\"feedback_text\": string, \"explanation\": string}. feedback_text is at most 60 words; explanation is at most 200 words and reviews four axes: grammar, use of articles, vocabulary range, and essay structure. Never include links or URLs.".into(),
      essay_user_template: "Essay prompt: {question}\nStudent essay:\n{student_answer}\n\nReview the essay on each axis (grammar, articles, vocabulary, structure) and name one concrete improvement per axis.".into(),
      arrangement_system: "You are a supportive Spanish tutor. Respond ONLY with strict JSON: {\"feedback_text\": string, \"explanation\": string}. feedback_text is at most 40 words; explanation is at most 120 words and MUST contain the complete correct sentence wrapped in ** marks. Never include links or URLs.".into(),
      arrangement_user_template: "Sentence-building task: {question}\nStudent arrangement: {student_answer}\nCorrect sentence: {correct_answer}\nThe student answered {result}. Show the correct sentence as **{correct_answer}** and explain the word order.".into(),
    }
  }
}

/// Attempt to load `AppConfig` from AULA_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("AULA_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "aula_backend", %path, "Loaded app config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "aula_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "aula_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bank_question_without_correct_option_is_skipped() {
    let cfg: ExerciseSetCfg = toml::from_str(
      r#"
      title = "Demo"
      [[questions]]
      text = "¿Ser o estar?"
      kind = "multiple_choice"
      [[questions.options]]
      text = "es"
      [[questions.options]]
      text = "está"
      "#,
    )
    .expect("toml");
    let set = cfg.into_exercise_set();
    assert!(set.questions.is_empty());
  }

  #[test]
  fn bank_set_converts_options_and_points() {
    let cfg: ExerciseSetCfg = toml::from_str(
      r#"
      id = "set-1"
      title = "Demo"
      [[questions]]
      id = "q-1"
      text = "¿El agua o la agua?"
      kind = "multiple_choice"
      points = 5
      [[questions.options]]
      text = "el agua"
      correct = true
      [[questions.options]]
      text = "la agua"
      "#,
    )
    .expect("toml");
    let set = cfg.into_exercise_set();
    assert_eq!(set.questions.len(), 1);
    let q = &set.questions[0];
    assert_eq!(q.points, 5);
    assert_eq!(q.correct_answer_text(), "el agua");
    assert_eq!(q.options[1].position, 1);
  }
}
