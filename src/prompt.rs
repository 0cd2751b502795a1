//! Prompt construction for feedback generation.
//!
//! Pure functions: question data in, provider instruction payload out. The
//! payload always requests a two-field JSON result (short feedback plus a
//! longer explanation, both word-budgeted) and never asks for hyperlinks;
//! reference materials are attached separately by the orchestrator.

use crate::config::Prompts;
use crate::domain::{Question, QuestionType};
use crate::util::fill_template;

/// System + user message pair sent to a model provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstructionPayload {
  pub system: String,
  pub user: String,
}

/// Build the provider instruction for one answered question.
///
/// Template family is chosen by question type: essays get the multi-axis
/// rubric, sentence arrangement mandates the literal correct sentence in the
/// response, everything else gets the compact single-concept template.
pub fn build_feedback_prompt(
  prompts: &Prompts,
  question: &Question,
  student_answer: &str,
  correct_answer: &str,
  is_correct: bool,
) -> InstructionPayload {
  let result = if is_correct { "correctly" } else { "incorrectly" };
  match question.kind {
    QuestionType::Essay => InstructionPayload {
      system: prompts.essay_system.clone(),
      user: fill_template(
        &prompts.essay_user_template,
        &[("question", &question.text), ("student_answer", student_answer)],
      ),
    },
    QuestionType::SentenceArrangement => InstructionPayload {
      system: prompts.arrangement_system.clone(),
      user: fill_template(
        &prompts.arrangement_user_template,
        &[
          ("question", &question.text),
          ("student_answer", student_answer),
          ("correct_answer", correct_answer),
          ("result", result),
        ],
      ),
    },
    QuestionType::MultipleChoice | QuestionType::TrueFalse => InstructionPayload {
      system: prompts.feedback_system.clone(),
      user: fill_template(
        &prompts.feedback_user_template,
        &[
          ("question", &question.text),
          ("student_answer", student_answer),
          ("correct_answer", correct_answer),
          ("result", result),
        ],
      ),
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ArrangementSpec;

  fn question(kind: QuestionType) -> Question {
    Question {
      id: "q1".into(),
      text: "Ordena: ayer / fui / al / mercado".into(),
      kind,
      points: 2,
      position: 0,
      arrangement: Some(ArrangementSpec { complete_sentence: "Ayer fui al mercado.".into() }),
      options: vec![],
    }
  }

  #[test]
  fn arrangement_prompt_embeds_the_literal_sentence() {
    let p = build_feedback_prompt(
      &Prompts::default(),
      &question(QuestionType::SentenceArrangement),
      "Fui ayer mercado al",
      "Ayer fui al mercado.",
      false,
    );
    assert!(p.user.contains("**Ayer fui al mercado.**"));
  }

  #[test]
  fn essay_prompt_uses_the_rubric_template() {
    let p = build_feedback_prompt(
      &Prompts::default(),
      &question(QuestionType::Essay),
      "Mi ciudad es bonita.",
      "",
      true,
    );
    for axis in ["grammar", "articles", "vocabulary", "structure"] {
      assert!(p.system.contains(axis) || p.user.contains(axis), "missing axis {axis}");
    }
  }

  #[test]
  fn prompts_request_two_fields_and_ban_links() {
    for kind in [QuestionType::MultipleChoice, QuestionType::Essay, QuestionType::SentenceArrangement] {
      let p = build_feedback_prompt(&Prompts::default(), &question(kind), "x", "y", true);
      assert!(p.system.contains("feedback_text"));
      assert!(p.system.contains("explanation"));
      assert!(!p.user.contains("http"));
    }
  }
}
