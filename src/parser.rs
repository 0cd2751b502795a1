//! Converting raw model output into a structured feedback record.
//!
//! Three tiers, tried in order, first success wins:
//!   1. strict: strip code fences, parse the outermost JSON object
//!   2. extract: field-literal regex recovery of partial fields
//!   3. synthesize: deterministic heuristics over the student's own answer
//!
//! Tier 3 is unconditional, so `parse_feedback` always returns a usable
//! two-field record and never fails.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::util::{split_sentences, tokenize_words};

static RE_CODE_FENCE_LINE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?im)^\s*```[\w-]*\s*$").expect("static regex"));
static RE_FEEDBACK_FIELD: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#""feedback_text"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("static regex")
});
static RE_EXPLANATION_FIELD: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#""explanation"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("static regex")
});

/// Which tier produced the record; logged by the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseTier {
  Strict,
  Extracted,
  Synthesized,
}

#[derive(Clone, Debug)]
pub struct ParsedFeedback {
  pub feedback_text: String,
  pub explanation: String,
  pub tier: ParseTier,
}

/// Inputs tier 3 synthesizes from. Deliberately the student's answer, not
/// the model's text: when we get here the model output was unusable.
#[derive(Clone, Copy, Debug)]
pub struct SynthesisContext<'a> {
  pub question_text: &'a str,
  pub student_answer: &'a str,
  pub is_correct: bool,
}

/// Parse raw model text into a feedback record. Never fails.
pub fn parse_feedback(raw: &str, ctx: &SynthesisContext<'_>) -> ParsedFeedback {
  if let Some((feedback_text, explanation)) = parse_strict(raw) {
    return ParsedFeedback { feedback_text, explanation, tier: ParseTier::Strict };
  }
  let (feedback, explanation) = extract_fields(raw);
  if feedback.is_some() || explanation.is_some() {
    let (synth_feedback, synth_explanation) = synthesize(ctx);
    return ParsedFeedback {
      feedback_text: feedback.unwrap_or(synth_feedback),
      explanation: explanation.unwrap_or(synth_explanation),
      tier: ParseTier::Extracted,
    };
  }
  let (feedback_text, explanation) = synthesize(ctx);
  ParsedFeedback { feedback_text, explanation, tier: ParseTier::Synthesized }
}

/// Tier 1: strict JSON parse of the outermost `{...}` span, fences stripped.
/// Both fields must be present and non-empty.
pub(crate) fn parse_strict(raw: &str) -> Option<(String, String)> {
  #[derive(Deserialize)]
  struct RawFeedback {
    feedback_text: String,
    explanation: String,
  }

  let stripped = RE_CODE_FENCE_LINE.replace_all(raw, "");
  let start = stripped.find('{')?;
  let end = stripped.rfind('}')?;
  if end <= start {
    return None;
  }
  let parsed: RawFeedback = serde_json::from_str(&stripped[start..=end]).ok()?;
  let feedback = parsed.feedback_text.trim().to_string();
  let explanation = parsed.explanation.trim().to_string();
  if feedback.is_empty() || explanation.is_empty() {
    return None;
  }
  Some((feedback, explanation))
}

/// Tier 2: locate the field literals anywhere in the text, even when the
/// surrounding JSON is malformed. Either field may be missing.
pub(crate) fn extract_fields(raw: &str) -> (Option<String>, Option<String>) {
  let grab = |re: &Regex| {
    re.captures(raw)
      .and_then(|c| c.get(1))
      .map(|m| unescape(m.as_str()))
      .filter(|s| !s.trim().is_empty())
  };
  (grab(&RE_FEEDBACK_FIELD), grab(&RE_EXPLANATION_FIELD))
}

fn unescape(s: &str) -> String {
  s.replace("\\n", "\n").replace("\\\"", "\"").replace("\\\\", "\\")
}

/// Tier 3: build feedback from the student's own text. Checks topical
/// overlap with the question, verb-ending and article usage, and sentence
/// shape, then emits a bullet list plus a correctness-conditioned summary.
pub(crate) fn synthesize(ctx: &SynthesisContext<'_>) -> (String, String) {
  const ARTICLES: &[&str] = &["el", "la", "los", "las", "un", "una", "unos", "unas"];
  const CONJUGATED_ENDINGS: &[&str] = &["amos", "emos", "imos", "aron", "ieron", "aba", "ía", "ó", "é"];

  let question_words = tokenize_words(ctx.question_text);
  let answer_words = tokenize_words(ctx.student_answer);
  let overlap = answer_words.iter().filter(|w| question_words.contains(w)).count();

  let mut bullets: Vec<String> = Vec::new();

  if answer_words.is_empty() {
    bullets.push("- Your answer was empty; try writing out a full response next time.".into());
  } else if overlap >= 2 {
    bullets.push("- Your answer stays on the topic of the question.".into());
  } else {
    bullets.push("- Your answer shares few words with the question; re-read the prompt to make sure you are answering what was asked.".into());
  }

  let has_infinitive = answer_words.iter().any(|w| {
    w.chars().count() > 3 && (w.ends_with("ar") || w.ends_with("er") || w.ends_with("ir"))
  });
  let has_conjugated = answer_words
    .iter()
    .any(|w| CONJUGATED_ENDINGS.iter().any(|e| w.chars().count() > 3 && w.ends_with(e)));
  if has_conjugated {
    bullets.push("- You are using conjugated verb forms; double-check that each ending matches its subject and tense.".into());
  } else if has_infinitive {
    bullets.push("- Some verbs appear in the infinitive; try conjugating them to match the subject.".into());
  }

  if answer_words.iter().any(|w| ARTICLES.contains(&w.as_str())) {
    bullets.push("- You are using articles; confirm each one matches its noun in gender and number.".into());
  } else if !answer_words.is_empty() {
    bullets.push("- Consider whether any of your nouns need a definite or indefinite article (el, la, un, una).".into());
  }

  let sentences = split_sentences(ctx.student_answer);
  if sentences.len() > 1 {
    let avg_words = answer_words.len() / sentences.len().max(1);
    bullets.push(format!(
      "- You wrote {} sentences averaging about {} words each; varying sentence length keeps writing natural.",
      sentences.len(),
      avg_words.max(1)
    ));
  }

  let summary = if ctx.is_correct {
    "¡Bien hecho! Your answer is correct. Review the notes below to reinforce the concept.".to_string()
  } else {
    "Not quite this time. Compare your answer with the notes below and revisit the reference materials.".to_string()
  };

  (summary, bullets.join("\n"))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ctx(answer: &str, is_correct: bool) -> SynthesisContext<'static> {
    // Leak is fine in tests; keeps the fixtures terse.
    SynthesisContext {
      question_text: "Escribe una frase sobre el mercado",
      student_answer: Box::leak(answer.to_string().into_boxed_str()),
      is_correct,
    }
  }

  #[test]
  fn strict_json_parses() {
    let raw = r#"{"feedback_text": "Good work", "explanation": "Ser describes identity."}"#;
    let out = parse_feedback(raw, &ctx("hola", true));
    assert_eq!(out.tier, ParseTier::Strict);
    assert_eq!(out.feedback_text, "Good work");
  }

  #[test]
  fn fenced_json_with_prose_parses_strictly() {
    let raw = "Here you go:\n```json\n{\"feedback_text\": \"Nice\", \"explanation\": \"Word order is subject first.\"}\n```";
    let out = parse_feedback(raw, &ctx("hola", true));
    assert_eq!(out.tier, ParseTier::Strict);
    assert_eq!(out.explanation, "Word order is subject first.");
  }

  #[test]
  fn broken_json_recovers_fields_by_extraction() {
    // Trailing brace is missing, so strict parsing fails.
    let raw = r#"{"feedback_text": "Casi perfecto", "explanation": "Use fui, not fue.""#;
    let out = parse_feedback(raw, &ctx("ayer fue al mercado", false));
    assert_eq!(out.tier, ParseTier::Extracted);
    assert_eq!(out.feedback_text, "Casi perfecto");
    assert_eq!(out.explanation, "Use fui, not fue.");
  }

  #[test]
  fn partial_extraction_fills_the_missing_half() {
    let raw = r#"feedback follows "feedback_text": "Sigue practicando" and nothing else"#;
    let out = parse_feedback(raw, &ctx("yo comer pan", false));
    assert_eq!(out.tier, ParseTier::Extracted);
    assert_eq!(out.feedback_text, "Sigue practicando");
    assert!(!out.explanation.is_empty());
  }

  #[test]
  fn plain_prose_synthesizes_from_the_student_answer() {
    let out = parse_feedback("The model refused to answer.", &ctx("Ayer compré fruta en el mercado", false));
    assert_eq!(out.tier, ParseTier::Synthesized);
    assert!(!out.feedback_text.is_empty());
    assert!(out.explanation.contains("articles"), "got: {}", out.explanation);
  }

  #[test]
  fn synthesis_summary_tracks_correctness() {
    let (right, _) = synthesize(&ctx("el mercado es grande", true));
    let (wrong, _) = synthesize(&ctx("el mercado es grande", false));
    assert!(right.contains("correct"));
    assert!(wrong.contains("Not quite"));
  }

  #[test]
  fn empty_input_still_yields_both_fields() {
    let out = parse_feedback("", &ctx("", false));
    assert!(!out.feedback_text.is_empty());
    assert!(!out.explanation.is_empty());
  }
}
