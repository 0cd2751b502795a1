//! Feedback orchestration: prompt → model → parser → references → store.
//!
//! Generation never fails toward the caller. Provider and transport errors
//! collapse into a typed fallback record (static apology, locally
//! synthesized explanation, reference triple, model id "error"), and a
//! missing provider produces the same shape under model id "fallback". The
//! student always gets a displayable object with exactly three references.

use std::time::Instant;

use tracing::{error, info, instrument};

use crate::catalog::select_references;
use crate::domain::{AiFeedback, Question, QuestionType};
use crate::llm::{ModelParams, ModelRoute};
use crate::parser::{parse_feedback, synthesize, SynthesisContext};
use crate::prompt::build_feedback_prompt;
use crate::state::AppState;

/// Everything the orchestrator needs about one scored answer.
#[derive(Clone, Debug)]
pub struct FeedbackInputs {
  pub student_answer_id: String,
  pub attempt_id: String,
  pub question: Question,
  pub student_answer_text: String,
  pub correct_answer_text: String,
  pub is_correct: bool,
}

/// Essays go to the high-reasoning route with a low temperature and a larger
/// token budget; everything else takes the standard route with a compact
/// instruction.
fn params_for(kind: QuestionType) -> ModelParams {
  match kind {
    QuestionType::Essay => ModelParams { route: ModelRoute::DeepReasoning, temperature: 0.2, max_tokens: 900 },
    _ => ModelParams { route: ModelRoute::Standard, temperature: 0.3, max_tokens: 400 },
  }
}

pub(crate) const APOLOGY: &str = "Lo sentimos, personalized feedback is unavailable right now. \
Review the correct answer and the reference materials below.";

/// Generate and persist feedback for one answer. Never fails: every path
/// yields a complete record, and the record is returned even if it was
/// already persisted for this answer (regeneration overwrites, one row per
/// answer).
#[instrument(level = "info", skip(state, inputs), fields(answer = %inputs.student_answer_id, kind = ?inputs.question.kind))]
pub async fn generate_feedback(state: &AppState, inputs: &FeedbackInputs) -> AiFeedback {
  let start = Instant::now();
  let references = select_references(
    &inputs.question.text,
    &inputs.correct_answer_text,
    &inputs.student_answer_text,
    inputs.question.kind,
  );
  let ctx = SynthesisContext {
    question_text: &inputs.question.text,
    student_answer: &inputs.student_answer_text,
    is_correct: inputs.is_correct,
  };

  let (feedback_text, explanation, ai_model, success) = match &state.model {
    Some(model) => {
      let payload = build_feedback_prompt(
        &state.prompts,
        &inputs.question,
        &inputs.student_answer_text,
        &inputs.correct_answer_text,
        inputs.is_correct,
      );
      let params = params_for(inputs.question.kind);
      match model.generate(&payload.system, &payload.user, &params).await {
        Ok(reply) => {
          let parsed = parse_feedback(&reply.text, &ctx);
          info!(target: "feedback", model = %reply.model, tier = ?parsed.tier, "Model feedback parsed");
          (parsed.feedback_text, parsed.explanation, reply.model, true)
        }
        Err(e) => {
          error!(target: "feedback", error = %crate::util::trunc_for_log(&e, 300), "Model call failed; serving fallback feedback");
          let (_, explanation) = synthesize(&ctx);
          (APOLOGY.to_string(), explanation, "error".to_string(), false)
        }
      }
    }
    None => {
      let (_, explanation) = synthesize(&ctx);
      (APOLOGY.to_string(), explanation, "fallback".to_string(), false)
    }
  };

  let row = AiFeedback {
    student_answer_id: inputs.student_answer_id.clone(),
    question_id: inputs.question.id.clone(),
    attempt_id: inputs.attempt_id.clone(),
    feedback_type: if inputs.is_correct { "correct".into() } else { "incorrect".into() },
    feedback_text,
    explanation,
    reference_materials: references,
    ai_model,
    processing_time_ms: start.elapsed().as_millis() as u64,
    success,
  };

  // The computed record is the caller's regardless of what storage does.
  state.store.upsert_feedback(row.clone()).await;
  info!(
    target: "feedback",
    answer = %row.student_answer_id,
    model = %row.ai_model,
    success = row.success,
    ms = row.processing_time_ms,
    "Feedback persisted"
  );
  row
}

/// Resolve a saved answer into feedback inputs and generate. Used by the
/// background signal after an answer is recorded.
#[instrument(level = "info", skip(state), fields(%answer_id))]
pub async fn generate_for_answer(state: &AppState, answer_id: &str) -> Result<AiFeedback, String> {
  let answer = state
    .store
    .get_answer(answer_id)
    .await
    .ok_or_else(|| format!("unknown answer id: {answer_id}"))?;
  let attempt = state
    .store
    .get_attempt(&answer.attempt_id)
    .await
    .ok_or_else(|| format!("unknown attempt id: {}", answer.attempt_id))?;
  let set = state
    .store
    .get_exercise_set(&attempt.exercise_set_id)
    .await
    .ok_or_else(|| format!("unknown exercise set id: {}", attempt.exercise_set_id))?;
  let question = set
    .question(&answer.question_id)
    .ok_or_else(|| format!("unknown question id: {}", answer.question_id))?
    .clone();

  let student_answer_text = answer
    .text_answer
    .clone()
    .or_else(|| answer.selected_option_id.as_deref().and_then(|id| question.option_text(id)))
    .unwrap_or_default();
  let correct_answer_text = question.correct_answer_text();

  let inputs = FeedbackInputs {
    student_answer_id: answer.id.clone(),
    attempt_id: answer.attempt_id.clone(),
    question,
    student_answer_text,
    correct_answer_text,
    is_correct: answer.is_correct,
  };
  Ok(generate_feedback(state, &inputs).await)
}
