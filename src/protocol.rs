//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{AiFeedback, ReferenceMaterial};

//
// Attempt creation / resumption
//

#[derive(Debug, Deserialize)]
pub struct AttemptIn {
    #[serde(rename = "studentId")]
    pub student_id: String,
    #[serde(rename = "exerciseSetId")]
    pub exercise_set_id: String,
}

#[derive(Serialize)]
pub struct AttemptOut {
    #[serde(rename = "attemptId")]
    pub attempt_id: String,
}

//
// Answer recording
//

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    #[serde(rename = "attemptId")]
    pub attempt_id: String,
    #[serde(rename = "questionId")]
    pub question_id: String,
    #[serde(default, rename = "selectedOptionId")]
    pub selected_option_id: Option<String>,
    #[serde(default, rename = "textAnswer")]
    pub text_answer: Option<String>,
    #[serde(rename = "isCorrect")]
    pub is_correct: bool,
}

#[derive(Serialize)]
pub struct AnswerOut {
    #[serde(rename = "answerId")]
    pub answer_id: String,
}

//
// Feedback generation
//

#[derive(Debug, Deserialize)]
pub struct FeedbackIn {
    #[serde(rename = "studentAnswerId")]
    pub student_answer_id: String,
    #[serde(rename = "questionId")]
    pub question_id: String,
    #[serde(rename = "attemptId")]
    pub attempt_id: String,
    #[serde(default, rename = "selectedOptionId")]
    pub selected_option_id: Option<String>,
    #[serde(default, rename = "textAnswer")]
    pub text_answer: Option<String>,
    #[serde(rename = "isCorrect")]
    pub is_correct: bool,
}

/// Always returned with HTTP 200: internal failures surface as
/// `success = false` with populated fallback `data`, never as an error
/// status.
#[derive(Serialize)]
pub struct FeedbackEnvelope {
    pub success: bool,
    pub data: FeedbackData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct FeedbackData {
    pub feedback_text: String,
    pub explanation: String,
    pub reference_materials: Vec<ReferenceMaterial>,
    pub processing_time_ms: u64,
    pub ai_model: String,
}

impl From<AiFeedback> for FeedbackData {
    fn from(row: AiFeedback) -> Self {
        Self {
            feedback_text: row.feedback_text,
            explanation: row.explanation,
            reference_materials: row.reference_materials,
            processing_time_ms: row.processing_time_ms,
            ai_model: row.ai_model,
        }
    }
}

//
// Attempt completion
//

#[derive(Debug, Deserialize)]
pub struct CompleteIn {
    #[serde(rename = "attemptId")]
    pub attempt_id: String,
}

#[derive(Serialize)]
pub struct CompleteOut {
    #[serde(rename = "totalScore")]
    pub total_score: u32,
    #[serde(rename = "maxPossibleScore")]
    pub max_possible_score: u32,
    pub percentage: f64,
}

//
// Shared
//

#[derive(Serialize)]
pub struct ErrorOut {
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
