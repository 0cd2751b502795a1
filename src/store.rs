//! In-memory persistence boundary: exercise sets, attempts, answers, and
//! feedback rows.
//!
//! Concurrency policy lives at the mutation API, not in business code:
//! `insert_attempt` enforces the one-in-progress-attempt uniqueness
//! constraint under its write lock and reports violations as
//! `StoreError::Conflict`; answers and feedback are upserts keyed on their
//! natural keys, so resubmission is last-writer-wins without any explicit
//! locking upstream.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{AiFeedback, AttemptStatus, ExerciseAttempt, ExerciseSet, StudentAnswer};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
  #[error("an in-progress attempt already exists for this student and exercise set")]
  Conflict,
  #[error("{0} not found")]
  NotFound(&'static str),
}

#[derive(Clone, Default)]
pub struct Store {
  exercise_sets: Arc<RwLock<HashMap<String, ExerciseSet>>>,
  attempts: Arc<RwLock<HashMap<String, ExerciseAttempt>>>,
  /// Keyed on (attempt_id, question_id): the upsert key for resubmission.
  answers: Arc<RwLock<HashMap<(String, String), StudentAnswer>>>,
  /// Keyed on student_answer_id: regeneration overwrites, never duplicates.
  feedback: Arc<RwLock<HashMap<String, AiFeedback>>>,
}

impl Store {
  #[allow(dead_code)]
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a store pre-loaded with exercise sets (bank + seeds at startup).
  pub fn with_exercise_sets(sets: Vec<ExerciseSet>) -> Self {
    let map: HashMap<String, ExerciseSet> = sets.into_iter().map(|s| (s.id.clone(), s)).collect();
    Self { exercise_sets: Arc::new(RwLock::new(map)), ..Self::default() }
  }

  // --- exercise sets (insert-only after startup) ---

  #[instrument(level = "debug", skip(self, set), fields(id = %set.id))]
  pub async fn insert_exercise_set(&self, set: ExerciseSet) {
    self.exercise_sets.write().await.insert(set.id.clone(), set);
  }

  pub async fn get_exercise_set(&self, id: &str) -> Option<ExerciseSet> {
    self.exercise_sets.read().await.get(id).cloned()
  }

  // --- attempts ---

  /// All attempts for the pair, newest attempt_number first.
  pub async fn attempts_for(&self, student_id: &str, exercise_set_id: &str) -> Vec<ExerciseAttempt> {
    let mut rows: Vec<ExerciseAttempt> = self
      .attempts
      .read()
      .await
      .values()
      .filter(|a| a.student_id == student_id && a.exercise_set_id == exercise_set_id)
      .cloned()
      .collect();
    rows.sort_by(|a, b| b.attempt_number.cmp(&a.attempt_number));
    rows
  }

  /// Insert a fresh attempt, enforcing the uniqueness constraint on
  /// (exercise_set_id, student_id, status = in_progress). The check and the
  /// insert happen under one write lock, which is what makes concurrent
  /// duplicate creation observable as a clean conflict.
  #[instrument(level = "debug", skip(self, attempt), fields(id = %attempt.id, n = attempt.attempt_number))]
  pub async fn insert_attempt(&self, attempt: ExerciseAttempt) -> Result<(), StoreError> {
    let mut attempts = self.attempts.write().await;
    let duplicate = attempts.values().any(|a| {
      a.student_id == attempt.student_id
        && a.exercise_set_id == attempt.exercise_set_id
        && a.status == AttemptStatus::InProgress
    });
    if duplicate {
      return Err(StoreError::Conflict);
    }
    attempts.insert(attempt.id.clone(), attempt);
    Ok(())
  }

  pub async fn get_attempt(&self, id: &str) -> Option<ExerciseAttempt> {
    self.attempts.read().await.get(id).cloned()
  }

  /// Overwrite an existing attempt row (used by completion).
  pub async fn save_attempt(&self, attempt: ExerciseAttempt) -> Result<(), StoreError> {
    let mut attempts = self.attempts.write().await;
    if !attempts.contains_key(&attempt.id) {
      return Err(StoreError::NotFound("attempt"));
    }
    attempts.insert(attempt.id.clone(), attempt);
    Ok(())
  }

  // --- answers ---

  /// Upsert keyed on (attempt, question). A resubmission keeps the original
  /// row id and answered_at moves to the latest write.
  #[instrument(level = "debug", skip(self), fields(%attempt_id, %question_id))]
  pub async fn upsert_answer(
    &self,
    attempt_id: &str,
    question_id: &str,
    selected_option_id: Option<String>,
    text_answer: Option<String>,
    is_correct: bool,
    points_earned: u32,
  ) -> StudentAnswer {
    let key = (attempt_id.to_string(), question_id.to_string());
    let mut answers = self.answers.write().await;
    let id = answers
      .get(&key)
      .map(|existing| existing.id.clone())
      .unwrap_or_else(|| Uuid::new_v4().to_string());
    let row = StudentAnswer {
      id,
      attempt_id: attempt_id.to_string(),
      question_id: question_id.to_string(),
      selected_option_id,
      text_answer,
      is_correct,
      points_earned,
      answered_at: Utc::now(),
    };
    answers.insert(key, row.clone());
    debug!(target: "attempt", answer = %row.id, "answer upserted");
    row
  }

  pub async fn answers_for_attempt(&self, attempt_id: &str) -> Vec<StudentAnswer> {
    self
      .answers
      .read()
      .await
      .values()
      .filter(|a| a.attempt_id == attempt_id)
      .cloned()
      .collect()
  }

  pub async fn get_answer(&self, answer_id: &str) -> Option<StudentAnswer> {
    self.answers.read().await.values().find(|a| a.id == answer_id).cloned()
  }

  // --- feedback ---

  /// One row per answer; regenerating feedback overwrites it in place.
  #[instrument(level = "debug", skip(self, row), fields(answer = %row.student_answer_id))]
  pub async fn upsert_feedback(&self, row: AiFeedback) {
    self.feedback.write().await.insert(row.student_answer_id.clone(), row);
  }

  #[allow(dead_code)]
  pub async fn get_feedback(&self, student_answer_id: &str) -> Option<AiFeedback> {
    self.feedback.read().await.get(student_answer_id).cloned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn attempt(id: &str, n: u32, status: AttemptStatus) -> ExerciseAttempt {
    ExerciseAttempt {
      id: id.into(),
      exercise_set_id: "set-1".into(),
      student_id: "student-1".into(),
      attempt_number: n,
      status,
      started_at: Utc::now(),
      submitted_at: None,
      total_score: 0,
      max_possible_score: 0,
      percentage: 0.0,
      time_spent_minutes: 0,
    }
  }

  #[tokio::test]
  async fn second_in_progress_attempt_conflicts() {
    let store = Store::new();
    store.insert_attempt(attempt("a1", 1, AttemptStatus::InProgress)).await.unwrap();
    let err = store.insert_attempt(attempt("a2", 2, AttemptStatus::InProgress)).await.unwrap_err();
    assert_eq!(err, StoreError::Conflict);
  }

  #[tokio::test]
  async fn submitted_attempts_do_not_block_new_ones() {
    let store = Store::new();
    store.insert_attempt(attempt("a1", 1, AttemptStatus::Submitted)).await.unwrap();
    store.insert_attempt(attempt("a2", 2, AttemptStatus::InProgress)).await.unwrap();
    assert_eq!(store.attempts_for("student-1", "set-1").await.len(), 2);
  }

  #[tokio::test]
  async fn answer_upsert_keeps_one_row_with_latest_values() {
    let store = Store::new();
    let first = store.upsert_answer("a1", "q1", Some("opt-1".into()), None, false, 0).await;
    let second = store.upsert_answer("a1", "q1", Some("opt-2".into()), None, true, 10).await;
    assert_eq!(first.id, second.id);
    let rows = store.answers_for_attempt("a1").await;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_correct);
    assert_eq!(rows[0].points_earned, 10);
    assert_eq!(rows[0].selected_option_id.as_deref(), Some("opt-2"));
  }

  #[tokio::test]
  async fn attempts_sort_newest_number_first() {
    let store = Store::new();
    store.insert_attempt(attempt("a1", 1, AttemptStatus::Submitted)).await.unwrap();
    store.insert_attempt(attempt("a2", 2, AttemptStatus::Submitted)).await.unwrap();
    store.insert_attempt(attempt("a3", 3, AttemptStatus::InProgress)).await.unwrap();
    let rows = store.attempts_for("student-1", "set-1").await;
    assert_eq!(rows[0].attempt_number, 3);
    assert_eq!(rows[2].attempt_number, 1);
  }
}
