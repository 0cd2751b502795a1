//! Class analytics collaborator.
//!
//! The aggregate refresh lives in an external service. It is strictly
//! best-effort: completion never waits on it and never fails because of it;
//! errors are logged and dropped.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::domain::ExerciseAttempt;

#[derive(Clone)]
pub struct Analytics {
  client: reqwest::Client,
  url: Option<String>,
}

#[derive(Serialize)]
struct AttemptAggregate<'a> {
  attempt_id: &'a str,
  exercise_set_id: &'a str,
  student_id: &'a str,
  total_score: u32,
  max_possible_score: u32,
  percentage: f64,
  time_spent_minutes: i64,
}

impl Analytics {
  /// Reads ANALYTICS_URL; when unset the refresh becomes a logged no-op.
  pub fn from_env() -> Self {
    let url = std::env::var("ANALYTICS_URL").ok();
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(5))
      .build()
      .unwrap_or_else(|_| reqwest::Client::new());
    Self { client, url }
  }

  /// Push the completed attempt aggregate. Failures are logged at warn and
  /// never retried synchronously.
  #[instrument(level = "info", skip(self, attempt), fields(attempt = %attempt.id))]
  pub async fn refresh(&self, attempt: &ExerciseAttempt) {
    let Some(url) = &self.url else {
      debug!(target: "attempt", "ANALYTICS_URL not set; skipping aggregate refresh");
      return;
    };
    let body = AttemptAggregate {
      attempt_id: &attempt.id,
      exercise_set_id: &attempt.exercise_set_id,
      student_id: &attempt.student_id,
      total_score: attempt.total_score,
      max_possible_score: attempt.max_possible_score,
      percentage: attempt.percentage,
      time_spent_minutes: attempt.time_spent_minutes,
    };
    match self.client.post(url).json(&body).send().await {
      Ok(res) if res.status().is_success() => {
        debug!(target: "attempt", "analytics aggregate refreshed");
      }
      Ok(res) => {
        warn!(target: "attempt", status = %res.status(), "analytics refresh rejected");
      }
      Err(e) => {
        warn!(target: "attempt", error = %e, "analytics refresh failed");
      }
    }
  }
}
