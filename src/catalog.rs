//! Curated reference catalog and the relevance selector.
//!
//! The catalog is a process-wide read-only table grouped by study category.
//! Selection is fully deterministic: keyword buckets grant priority slots,
//! tag-hit scoring fills the rest, and ties resolve in catalog order so the
//! same inputs always produce the same ordered triple.

use tracing::instrument;

use crate::domain::{QuestionType, ReferenceMaterial};

/// How many references every answer receives, no matter what.
pub const REFERENCE_COUNT: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefCategory {
  Grammar,
  Conjugation,
  Vocabulary,
  Pronunciation,
  EssayWriting,
}

pub struct CatalogEntry {
  pub category: RefCategory,
  pub title: &'static str,
  pub url: &'static str,
  pub description: &'static str,
  pub tags: &'static [&'static str],
}

macro_rules! entry {
  ($cat:expr, $title:expr, $url:expr, $desc:expr, $tags:expr) => {
    CatalogEntry { category: $cat, title: $title, url: $url, description: $desc, tags: $tags }
  };
}

/// Catalog order is the tie-break order; keep new entries appended within
/// their category block.
pub const CATALOG: &[CatalogEntry] = &[
  // Grammar
  entry!(RefCategory::Grammar, "Ser vs. Estar",
    "https://studyspanish.com/grammar/lessons/serest1",
    "When to use each of the two Spanish verbs for \"to be\", with contrast drills.",
    &["ser", "estar", "to be", "es", "está"]),
  entry!(RefCategory::Grammar, "Definite and Indefinite Articles",
    "https://www.spanishdict.com/guide/definite-and-indefinite-articles",
    "El, la, los, las, un and una: gender, number, and when articles are dropped.",
    &["article", "artículo", "el", "la", "un", "una", "gender"]),
  entry!(RefCategory::Grammar, "Noun-Adjective Agreement",
    "https://www.spanishdict.com/guide/noun-adjective-agreement",
    "Matching adjectives to nouns in gender and number, including common exceptions.",
    &["agreement", "concordancia", "adjective", "plural", "gender"]),
  entry!(RefCategory::Grammar, "Spanish Word Order",
    "https://studyspanish.com/grammar/lessons/wordorder",
    "Subject, verb, and object placement, plus question inversion patterns.",
    &["word order", "sentence", "structure", "syntax", "question"]),
  // Conjugation
  entry!(RefCategory::Conjugation, "Present Tense Conjugation",
    "https://www.spanishdict.com/guide/spanish-present-tense-forms",
    "Regular -ar, -er and -ir endings in the present tense with worked examples.",
    &["present", "conjugation", "verb", "ending", "tense"]),
  entry!(RefCategory::Conjugation, "Preterite vs. Imperfect",
    "https://studyspanish.com/grammar/lessons/pretimp1",
    "Choosing between the two past tenses for completed versus ongoing actions.",
    &["preterite", "imperfect", "past", "pretérito", "tense"]),
  entry!(RefCategory::Conjugation, "Irregular and Stem-Changing Verbs",
    "https://www.spanishdict.com/guide/stem-changing-verbs",
    "The common irregular families (e→ie, o→ue, e→i) and fully irregular verbs.",
    &["irregular", "stem", "verb", "tener", "poder"]),
  entry!(RefCategory::Conjugation, "The Subjunctive Mood",
    "https://studyspanish.com/grammar/lessons/subj1",
    "Triggers and conjugation of the present subjunctive in everyday sentences.",
    &["subjunctive", "subjuntivo", "mood", "espero", "quiera"]),
  // Vocabulary
  entry!(RefCategory::Vocabulary, "Core Frequency Vocabulary",
    "https://www.spanishdict.com/lists/core-vocabulary",
    "The thousand most frequent Spanish words, grouped by topic for review.",
    &["vocabulary", "vocabulario", "word", "palabra", "frequency"]),
  entry!(RefCategory::Vocabulary, "False Friends",
    "https://studyspanish.com/vocabulary/false-friends",
    "Spanish words that look like English words but mean something different.",
    &["false friend", "cognate", "meaning", "embarazada", "actual"]),
  entry!(RefCategory::Vocabulary, "Everyday Expressions",
    "https://www.spanishdict.com/guide/common-spanish-phrases",
    "Greetings, courtesy phrases, and conversational fillers for daily use.",
    &["phrase", "expression", "greeting", "conversation", "saludo"]),
  // Pronunciation
  entry!(RefCategory::Pronunciation, "The Five Vowel Sounds",
    "https://studyspanish.com/pronunciation/vowels",
    "Spanish vowels are short and pure; drills for each of the five sounds.",
    &["vowel", "pronunciation", "sound", "vocal"]),
  entry!(RefCategory::Pronunciation, "Rolling the R",
    "https://www.spanishdict.com/guide/spanish-r-and-rr",
    "Single tap versus trilled rr, with minimal pairs like pero and perro.",
    &["rr", "trill", "pronunciation", "pero", "perro"]),
  entry!(RefCategory::Pronunciation, "Stress and Written Accents",
    "https://studyspanish.com/pronunciation/stress",
    "Default stress rules and when a written tilde overrides them.",
    &["accent", "stress", "tilde", "sílaba", "acento"]),
  // Essay writing
  entry!(RefCategory::EssayWriting, "Structuring a Short Essay",
    "https://www.spanishdict.com/guide/writing-a-spanish-essay",
    "Introduction, body, and conclusion patterns sized for classroom essays.",
    &["essay", "ensayo", "paragraph", "structure", "introduction"]),
  entry!(RefCategory::EssayWriting, "Connectors and Transitions",
    "https://studyspanish.com/writing/connectors",
    "Linking words such as además, sin embargo and por lo tanto, with usage notes.",
    &["connector", "transition", "además", "sin embargo", "porque"]),
  entry!(RefCategory::EssayWriting, "Revising Common Writing Errors",
    "https://www.spanishdict.com/guide/common-writing-mistakes",
    "A revision checklist covering agreement slips, tense drift, and anglicisms.",
    &["writing", "error", "revision", "checklist", "draft"]),
];

// Keyword buckets used for the priority slots. Matching is substring search
// over the lower-cased corpus, so multi-word keys are allowed.
const GRAMMAR_KEYS: &[&str] = &[
  "ser", "estar", "artículo", "article", "el ", "la ", "un ", "una ",
  "gender", "género", "agreement", "concordancia", "verb", "verbo",
  "tense", "tiempo", "conjuga", "preterite", "pretérito", "subjunctive",
  "subjuntivo", "grammar", "gramática",
];
const VOCAB_KEYS: &[&str] = &[
  "vocabulary", "vocabulario", "word", "palabra", "meaning", "significa",
  "synonym", "sinónimo", "translate", "traduc",
];
const ESSAY_KEYS: &[&str] = &[
  "essay", "ensayo", "paragraph", "párrafo", "write", "escrib",
  "composition", "redacción",
];

fn top_of(category: RefCategory) -> usize {
  // Every category has at least one entry in CATALOG.
  CATALOG
    .iter()
    .position(|e| e.category == category)
    .expect("catalog covers every category")
}

fn material(idx: usize) -> ReferenceMaterial {
  let e = &CATALOG[idx];
  ReferenceMaterial {
    title: e.title.to_string(),
    url: e.url.to_string(),
    description: e.description.to_string(),
  }
}

/// Fixed default triple used when nothing in the corpus matches at all.
fn default_triple(kind: QuestionType) -> Vec<usize> {
  if kind == QuestionType::Essay {
    vec![top_of(RefCategory::EssayWriting), top_of(RefCategory::Grammar), top_of(RefCategory::Vocabulary)]
  } else {
    vec![top_of(RefCategory::Grammar), top_of(RefCategory::Conjugation), top_of(RefCategory::Vocabulary)]
  }
}

/// Pick exactly three catalog entries for a question/answer context.
///
/// Priority slots come from keyword buckets (grammar before conjugation
/// before vocabulary before essay), then tag-hit scoring fills the rest.
/// Ties keep catalog order. The result is reproducible for equal inputs.
#[instrument(level = "debug", skip_all, fields(kind = ?kind))]
pub fn select_references(
  question_text: &str,
  correct_answer: &str,
  student_answer: &str,
  kind: QuestionType,
) -> Vec<ReferenceMaterial> {
  let corpus = format!("{} {} {}", question_text, correct_answer, student_answer).to_lowercase();

  let mut chosen: Vec<usize> = Vec::new();
  let push = |idx: usize, chosen: &mut Vec<usize>| {
    if chosen.len() < REFERENCE_COUNT && !chosen.contains(&idx) {
      chosen.push(idx);
    }
  };

  let grammar_hit = GRAMMAR_KEYS.iter().any(|k| corpus.contains(k));
  let vocab_hit = VOCAB_KEYS.iter().any(|k| corpus.contains(k));
  let essay_hit = kind == QuestionType::Essay && ESSAY_KEYS.iter().any(|k| corpus.contains(k));

  if grammar_hit {
    push(top_of(RefCategory::Grammar), &mut chosen);
    push(top_of(RefCategory::Conjugation), &mut chosen);
  }
  if vocab_hit {
    push(top_of(RefCategory::Vocabulary), &mut chosen);
  }
  if essay_hit {
    push(top_of(RefCategory::EssayWriting), &mut chosen);
  }

  // Score every entry by how many of its own tags appear in the corpus.
  let mut scored: Vec<(usize, usize)> = CATALOG
    .iter()
    .enumerate()
    .map(|(i, e)| (i, e.tags.iter().filter(|t| corpus.contains(*t)).count()))
    .filter(|(_, score)| *score > 0)
    .collect();
  scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

  for (idx, _) in scored {
    push(idx, &mut chosen);
  }

  // Nothing matched at all: serve the fixed defaults for the question type.
  if chosen.is_empty() {
    chosen = default_triple(kind);
  }

  // Partial matches still owe the student three entries; pad from the
  // defaults, then catalog order.
  for idx in default_triple(kind) {
    push(idx, &mut chosen);
  }
  for idx in 0..CATALOG.len() {
    push(idx, &mut chosen);
  }

  chosen.truncate(REFERENCE_COUNT);
  chosen.into_iter().map(material).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn identical_inputs_yield_identical_triples() {
    let a = select_references("Conjuga el verbo hablar", "hablo", "hablas", QuestionType::MultipleChoice);
    let b = select_references("Conjuga el verbo hablar", "hablo", "hablas", QuestionType::MultipleChoice);
    assert_eq!(a, b);
    assert_eq!(a.len(), REFERENCE_COUNT);
  }

  #[test]
  fn empty_corpus_falls_back_to_defaults() {
    let refs = select_references("", "", "", QuestionType::TrueFalse);
    assert_eq!(refs.len(), REFERENCE_COUNT);
    assert_eq!(refs[0].title, "Ser vs. Estar");
    let essay = select_references("", "", "", QuestionType::Essay);
    assert_eq!(essay[0].title, "Structuring a Short Essay");
  }

  #[test]
  fn subjunctive_corpus_pulls_the_subjunctive_entry() {
    let refs = select_references(
      "Completa con el subjuntivo",
      "espero que vengas",
      "espero que vienes",
      QuestionType::MultipleChoice,
    );
    assert!(refs.iter().any(|r| r.title == "The Subjunctive Mood"), "got {:?}", refs);
  }

  #[test]
  fn essay_bucket_is_ignored_for_non_essay_questions() {
    // "redacción" hits the essay bucket but no tags, so only the essay
    // question type earns the essay-writing priority slot.
    let essay = select_references("redacción breve", "", "", QuestionType::Essay);
    assert_eq!(essay[0].title, "Structuring a Short Essay");
    let mc = select_references("redacción breve", "", "", QuestionType::MultipleChoice);
    assert_eq!(mc[0].title, "Ser vs. Estar");
  }

  #[test]
  fn no_duplicate_entries_in_a_triple() {
    let refs = select_references(
      "el artículo y el verbo ser",
      "la casa es grande",
      "la casa está grande",
      QuestionType::MultipleChoice,
    );
    assert_eq!(refs.len(), REFERENCE_COUNT);
    for i in 0..refs.len() {
      for j in (i + 1)..refs.len() {
        assert_ne!(refs[i], refs[j]);
      }
    }
  }
}
