//! Domain models: exercise sets, questions, attempts, answers, and feedback rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of question is presented to the student?
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
  /// Pick one option from a list; exactly one option is correct.
  MultipleChoice,
  /// Two options, one correct.
  TrueFalse,
  /// Free-text writing; evaluated along grammar/vocabulary/structure axes.
  Essay,
  /// Rebuild a sentence from word tiles; distractor tiles may be present.
  SentenceArrangement,
}

/// Has the attempt been handed in yet?
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
  InProgress,
  Submitted,
}

/// One selectable option (or word tile, for sentence arrangement).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnswerOption {
  pub id: String,
  pub text: String,
  pub is_correct: bool,
  pub position: u32,
  /// Sentence arrangement only: true when the tile belongs to the fill
  /// sequence, false for distractor tiles.
  #[serde(default)]
  pub is_blank_word: bool,
}

/// Extra configuration carried by sentence-arrangement questions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArrangementSpec {
  pub complete_sentence: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
  pub id: String,
  pub text: String,
  pub kind: QuestionType,
  pub points: u32,
  pub position: u32,
  #[serde(default)] pub arrangement: Option<ArrangementSpec>,
  #[serde(default)] pub options: Vec<AnswerOption>,
}

impl Question {
  /// The text a correct answer would carry, used for prompts and references.
  /// Essays have no single expected answer and yield an empty string.
  pub fn correct_answer_text(&self) -> String {
    if let Some(arr) = &self.arrangement {
      return arr.complete_sentence.clone();
    }
    if self.kind == QuestionType::SentenceArrangement {
      // No stored sentence: rebuild it from the fill-sequence tiles.
      let mut tiles: Vec<&AnswerOption> = self.options.iter().filter(|o| o.is_blank_word).collect();
      tiles.sort_by_key(|o| o.position);
      return tiles.iter().map(|o| o.text.as_str()).collect::<Vec<_>>().join(" ");
    }
    self
      .options
      .iter()
      .find(|o| o.is_correct)
      .map(|o| o.text.clone())
      .unwrap_or_default()
  }

  pub fn option_text(&self, option_id: &str) -> Option<String> {
    self.options.iter().find(|o| o.id == option_id).map(|o| o.text.clone())
  }
}

/// A published collection of questions owned by a class/creator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExerciseSet {
  pub id: String,
  pub class_id: String,
  pub creator_id: String,
  pub title: String,
  #[serde(default)] pub shuffle_questions: bool,
  #[serde(default)] pub max_attempts: Option<u32>,
  pub questions: Vec<Question>,
}

impl ExerciseSet {
  pub fn question(&self, question_id: &str) -> Option<&Question> {
    self.questions.iter().find(|q| q.id == question_id)
  }

  pub fn max_points(&self) -> u32 {
    self.questions.iter().map(|q| q.points).sum()
  }
}

/// One scored pass through an exercise set by one student.
///
/// Invariant: at most one `InProgress` row exists per (student, set); the
/// store enforces this at insert time and the lifecycle manager recovers
/// from the resulting conflicts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExerciseAttempt {
  pub id: String,
  pub exercise_set_id: String,
  pub student_id: String,
  pub attempt_number: u32,
  pub status: AttemptStatus,
  pub started_at: DateTime<Utc>,
  #[serde(default)] pub submitted_at: Option<DateTime<Utc>>,
  pub total_score: u32,
  pub max_possible_score: u32,
  pub percentage: f64,
  pub time_spent_minutes: i64,
}

/// One answer per (attempt, question); resubmission overwrites in place.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StudentAnswer {
  pub id: String,
  pub attempt_id: String,
  pub question_id: String,
  #[serde(default)] pub selected_option_id: Option<String>,
  #[serde(default)] pub text_answer: Option<String>,
  pub is_correct: bool,
  pub points_earned: u32,
  pub answered_at: DateTime<Utc>,
}

/// Curated study pointer snapshotted into each feedback row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceMaterial {
  pub title: String,
  pub url: String,
  pub description: String,
}

/// Generated commentary for a single answer. Exactly one row per answer;
/// regeneration overwrites it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AiFeedback {
  pub student_answer_id: String,
  pub question_id: String,
  pub attempt_id: String,
  pub feedback_type: String,
  pub feedback_text: String,
  pub explanation: String,
  pub reference_materials: Vec<ReferenceMaterial>,
  pub ai_model: String,
  pub processing_time_ms: u64,
  pub success: bool,
}
