//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Lower-cased word tokens, stripped of punctuation. Keeps letters with
/// diacritics so Spanish words survive intact.
pub fn tokenize_words(s: &str) -> Vec<String> {
  s.split(|c: char| !c.is_alphanumeric() && c != '\'')
    .filter(|w| !w.is_empty())
    .map(|w| w.to_lowercase())
    .collect()
}

/// Split text into sentences on terminal punctuation. Empty fragments are
/// dropped; a trailing fragment without punctuation still counts.
pub fn split_sentences(s: &str) -> Vec<String> {
  s.split(|c: char| matches!(c, '.' | '!' | '?' | '¡' | '¿' | '\n'))
    .map(|t| t.trim())
    .filter(|t| !t.is_empty())
    .map(|t| t.to_string())
    .collect()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    s.to_string()
  } else {
    let cut = s
      .char_indices()
      .take_while(|(i, _)| *i < max)
      .last()
      .map(|(i, c)| i + c.len_utf8())
      .unwrap_or(0);
    format!("{}… ({} bytes total)", &s[..cut], s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn template_replaces_all_occurrences() {
    let out = fill_template("{a} and {b} and {a}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and y and x");
  }

  #[test]
  fn tokenizer_keeps_accents_and_lowercases() {
    let words = tokenize_words("¿Dónde está EL baño?");
    assert_eq!(words, vec!["dónde", "está", "el", "baño"]);
  }

  #[test]
  fn sentences_split_on_terminal_punctuation() {
    let s = split_sentences("Hola. ¿Qué tal? Bien");
    assert_eq!(s.len(), 3);
  }
}
