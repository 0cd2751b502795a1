//! Attempt lifecycle (create/resume/complete) and answer recording.
//!
//! Creation is safe under concurrent duplicate requests: the store's
//! uniqueness constraint turns the race into a `Conflict`, and the manager
//! recovers by re-querying after a short backoff, retrying the insert once
//! with an incremented attempt number only if the re-query comes up empty.
//! The conflict is never surfaced to the caller.

use chrono::Utc;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{AttemptStatus, ExerciseAttempt};
use crate::state::AppState;
use crate::store::StoreError;

const CONFLICT_BACKOFF_MS: u64 = 25;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RecordError {
  #[error("attempt not found")]
  AttemptNotFound,
  #[error("attempt is already submitted")]
  AttemptSubmitted,
  #[error("exercise set not found")]
  ExerciseSetNotFound,
  #[error("question does not belong to this exercise set")]
  QuestionNotFound,
}

/// Aggregate returned by completion; mirrors the stored attempt fields.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompletionSummary {
  pub total_score: u32,
  pub max_possible_score: u32,
  pub percentage: f64,
}

fn fresh_attempt(student_id: &str, exercise_set_id: &str, attempt_number: u32) -> ExerciseAttempt {
  ExerciseAttempt {
    id: Uuid::new_v4().to_string(),
    exercise_set_id: exercise_set_id.to_string(),
    student_id: student_id.to_string(),
    attempt_number,
    status: AttemptStatus::InProgress,
    started_at: Utc::now(),
    submitted_at: None,
    total_score: 0,
    max_possible_score: 0,
    percentage: 0.0,
    time_spent_minutes: 0,
  }
}

/// Return the open attempt for (student, set), creating one if needed.
/// Concurrent duplicate calls all resolve to the same attempt id.
#[instrument(level = "info", skip(state), fields(%student_id, %exercise_set_id))]
pub async fn create_or_resume(
  state: &AppState,
  student_id: &str,
  exercise_set_id: &str,
) -> Result<String, StoreError> {
  if state.store.get_exercise_set(exercise_set_id).await.is_none() {
    return Err(StoreError::NotFound("exercise set"));
  }

  let existing = state.store.attempts_for(student_id, exercise_set_id).await;
  if let Some(open) = existing.iter().find(|a| a.status == AttemptStatus::InProgress) {
    info!(target: "attempt", id = %open.id, n = open.attempt_number, "Resuming open attempt");
    return Ok(open.id.clone());
  }

  let next_number = existing.first().map(|a| a.attempt_number).unwrap_or(0) + 1;
  let attempt = fresh_attempt(student_id, exercise_set_id, next_number);
  let attempt_id = attempt.id.clone();
  match state.store.insert_attempt(attempt).await {
    Ok(()) => {
      info!(target: "attempt", id = %attempt_id, n = next_number, "Created attempt");
      Ok(attempt_id)
    }
    Err(StoreError::Conflict) => {
      // A concurrent request won the insert. Back off briefly and adopt
      // the row it created.
      warn!(target: "attempt", %student_id, %exercise_set_id, "Attempt insert conflicted; re-querying");
      sleep(Duration::from_millis(CONFLICT_BACKOFF_MS)).await;
      let rows = state.store.attempts_for(student_id, exercise_set_id).await;
      if let Some(open) = rows.iter().find(|a| a.status == AttemptStatus::InProgress) {
        info!(target: "attempt", id = %open.id, "Conflict resolved to existing attempt");
        return Ok(open.id.clone());
      }
      // Pathological timing: the winner vanished between the conflict and
      // the re-query. One more insert with a bumped number, then give up.
      let retry = fresh_attempt(student_id, exercise_set_id, next_number + 1);
      let retry_id = retry.id.clone();
      state.store.insert_attempt(retry).await?;
      warn!(target: "attempt", id = %retry_id, "Conflict resolved by retry insert");
      Ok(retry_id)
    }
    Err(e) => Err(e),
  }
}

/// Finalize an attempt: aggregate scores, stamp submission, fire analytics.
/// Completing an already-submitted attempt is a no-op returning the stored
/// totals.
#[instrument(level = "info", skip(state), fields(%attempt_id))]
pub async fn complete(state: &AppState, attempt_id: &str) -> Result<CompletionSummary, StoreError> {
  let mut attempt = state
    .store
    .get_attempt(attempt_id)
    .await
    .ok_or(StoreError::NotFound("attempt"))?;

  if attempt.status == AttemptStatus::Submitted {
    info!(target: "attempt", id = %attempt.id, "Attempt already submitted; completion is a no-op");
    return Ok(CompletionSummary {
      total_score: attempt.total_score,
      max_possible_score: attempt.max_possible_score,
      percentage: attempt.percentage,
    });
  }

  let set = state
    .store
    .get_exercise_set(&attempt.exercise_set_id)
    .await
    .ok_or(StoreError::NotFound("exercise set"))?;

  let answers = state.store.answers_for_attempt(attempt_id).await;
  let total_score: u32 = answers.iter().map(|a| a.points_earned).sum();
  let max_possible_score = set.max_points();
  let percentage = if max_possible_score == 0 {
    0.0
  } else {
    f64::from(total_score) / f64::from(max_possible_score) * 100.0
  };
  let now = Utc::now();
  let time_spent_minutes = (now - attempt.started_at).num_minutes().max(1);

  attempt.status = AttemptStatus::Submitted;
  attempt.submitted_at = Some(now);
  attempt.total_score = total_score;
  attempt.max_possible_score = max_possible_score;
  attempt.percentage = percentage;
  attempt.time_spent_minutes = time_spent_minutes;
  state.store.save_attempt(attempt.clone()).await?;

  info!(
    target: "attempt",
    id = %attempt.id,
    total = total_score,
    max = max_possible_score,
    pct = %format!("{:.2}", percentage),
    minutes = time_spent_minutes,
    "Attempt submitted"
  );

  // Best-effort aggregate refresh; completion never waits on it.
  let analytics = state.analytics.clone();
  tokio::spawn(async move {
    analytics.refresh(&attempt).await;
  });

  Ok(CompletionSummary { total_score, max_possible_score, percentage })
}

/// Validate and upsert one answer, then kick off feedback generation.
#[instrument(level = "info", skip(state, selected_option_id, text_answer), fields(%attempt_id, %question_id, is_correct))]
pub async fn record_answer(
  state: &AppState,
  attempt_id: &str,
  question_id: &str,
  selected_option_id: Option<String>,
  text_answer: Option<String>,
  is_correct: bool,
) -> Result<String, RecordError> {
  let attempt = state
    .store
    .get_attempt(attempt_id)
    .await
    .ok_or(RecordError::AttemptNotFound)?;
  if attempt.status == AttemptStatus::Submitted {
    return Err(RecordError::AttemptSubmitted);
  }

  let set = state
    .store
    .get_exercise_set(&attempt.exercise_set_id)
    .await
    .ok_or(RecordError::ExerciseSetNotFound)?;
  let question = set.question(question_id).ok_or(RecordError::QuestionNotFound)?;
  let points_earned = if is_correct { question.points } else { 0 };

  let row = state
    .store
    .upsert_answer(attempt_id, question_id, selected_option_id, text_answer, is_correct, points_earned)
    .await;
  info!(target: "attempt", answer = %row.id, points = points_earned, "Answer recorded");

  // Feedback is decoupled from scoring: fire and forget, log on failure.
  let answer_id = row.id.clone();
  let bg_state = AppState::clone(state);
  tokio::spawn(async move {
    if let Err(e) = crate::feedback::generate_for_answer(&bg_state, &answer_id).await {
      error!(target: "feedback", answer = %answer_id, error = %e, "Background feedback generation failed");
    }
  });

  Ok(row.id)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{AnswerOption, ExerciseSet, Question, QuestionType};

  fn scored_set() -> ExerciseSet {
    let q = |id: &str, points: u32, position: u32| Question {
      id: id.into(),
      text: format!("Pregunta {position}"),
      kind: QuestionType::MultipleChoice,
      points,
      position,
      arrangement: None,
      options: vec![AnswerOption {
        id: format!("{id}-o1"),
        text: "sí".into(),
        is_correct: true,
        position: 0,
        is_blank_word: false,
      }],
    };
    ExerciseSet {
      id: "set-scored".into(),
      class_id: "class".into(),
      creator_id: "tests".into(),
      title: "Scored".into(),
      shuffle_questions: false,
      max_attempts: None,
      questions: vec![q("q1", 10, 0), q("q2", 20, 1), q("q3", 5, 2)],
    }
  }

  #[tokio::test]
  async fn sequential_calls_resume_the_same_attempt() {
    let state = AppState::for_tests(None);
    let first = create_or_resume(&state, "s1", "set-demo").await.unwrap();
    let second = create_or_resume(&state, "s1", "set-demo").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(state.store.attempts_for("s1", "set-demo").await.len(), 1);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn concurrent_creation_resolves_to_one_attempt() {
    let state = AppState::for_tests(None);
    let mut handles = Vec::new();
    for _ in 0..8 {
      let state = state.clone();
      handles.push(tokio::spawn(async move {
        create_or_resume(&state, "s1", "set-demo").await.unwrap()
      }));
    }
    let mut ids = Vec::new();
    for h in handles {
      ids.push(h.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "all callers must adopt the same attempt");
    let rows = state.store.attempts_for("s1", "set-demo").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, AttemptStatus::InProgress);
  }

  #[tokio::test]
  async fn unknown_exercise_set_is_rejected() {
    let state = AppState::for_tests(None);
    let err = create_or_resume(&state, "s1", "set-missing").await.unwrap_err();
    assert_eq!(err, StoreError::NotFound("exercise set"));
  }

  #[tokio::test]
  async fn completion_aggregates_scores() {
    let state = AppState::for_tests(None);
    state.store.insert_exercise_set(scored_set()).await;
    let attempt_id = create_or_resume(&state, "s1", "set-scored").await.unwrap();
    record_answer(&state, &attempt_id, "q1", Some("q1-o1".into()), None, true).await.unwrap();
    record_answer(&state, &attempt_id, "q2", Some("q2-o1".into()), None, false).await.unwrap();
    record_answer(&state, &attempt_id, "q3", Some("q3-o1".into()), None, true).await.unwrap();

    let summary = complete(&state, &attempt_id).await.unwrap();
    assert_eq!(summary.total_score, 15);
    assert_eq!(summary.max_possible_score, 35);
    assert!((summary.percentage - 42.857).abs() < 0.01);

    let stored = state.store.get_attempt(&attempt_id).await.unwrap();
    assert_eq!(stored.status, AttemptStatus::Submitted);
    assert!(stored.submitted_at.is_some());
    assert!(stored.time_spent_minutes >= 1);
  }

  #[tokio::test]
  async fn completing_twice_is_a_no_op() {
    let state = AppState::for_tests(None);
    state.store.insert_exercise_set(scored_set()).await;
    let attempt_id = create_or_resume(&state, "s1", "set-scored").await.unwrap();
    record_answer(&state, &attempt_id, "q1", Some("q1-o1".into()), None, true).await.unwrap();
    let first = complete(&state, &attempt_id).await.unwrap();
    let second = complete(&state, &attempt_id).await.unwrap();
    assert_eq!(first, second);
  }

  #[tokio::test]
  async fn completion_with_no_questions_yields_zero_percentage() {
    let state = AppState::for_tests(None);
    let mut empty = scored_set();
    empty.id = "set-empty".into();
    empty.questions.clear();
    state.store.insert_exercise_set(empty).await;
    let attempt_id = create_or_resume(&state, "s1", "set-empty").await.unwrap();
    let summary = complete(&state, &attempt_id).await.unwrap();
    assert_eq!(summary.max_possible_score, 0);
    assert_eq!(summary.percentage, 0.0);
  }

  #[tokio::test]
  async fn recording_against_a_submitted_attempt_is_rejected() {
    let state = AppState::for_tests(None);
    let attempt_id = create_or_resume(&state, "s1", "set-demo").await.unwrap();
    complete(&state, &attempt_id).await.unwrap();
    let err = record_answer(&state, &attempt_id, "q-demo-1", Some("q-demo-1-o1".into()), None, true)
      .await
      .unwrap_err();
    assert_eq!(err, RecordError::AttemptSubmitted);
  }

  #[tokio::test]
  async fn recording_against_a_missing_attempt_is_rejected() {
    let state = AppState::for_tests(None);
    let err = record_answer(&state, "missing", "q-demo-1", None, None, true).await.unwrap_err();
    assert_eq!(err, RecordError::AttemptNotFound);
  }

  #[tokio::test]
  async fn submitting_after_completion_starts_a_new_attempt_number() {
    let state = AppState::for_tests(None);
    let first = create_or_resume(&state, "s1", "set-demo").await.unwrap();
    complete(&state, &first).await.unwrap();
    let second = create_or_resume(&state, "s1", "set-demo").await.unwrap();
    assert_ne!(first, second);
    let rows = state.store.attempts_for("s1", "set-demo").await;
    assert_eq!(rows[0].attempt_number, 2);
  }
}
