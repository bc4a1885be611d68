//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values, in a
/// single pass: substituted values are never scanned for further keys.
/// Unknown `{...}` sequences are left as they are.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = String::with_capacity(tpl.len());
  let mut rest = tpl;
  while let Some(open) = rest.find('{') {
    out.push_str(&rest[..open]);
    let after = &rest[open + 1..];
    let hit = after.find('}').and_then(|close| {
      let key = &after[..close];
      pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| (*v, close))
    });
    match hit {
      Some((value, close)) => {
        out.push_str(value);
        rest = &after[close + 1..];
      }
      None => {
        out.push('{');
        rest = after;
      }
    }
  }
  out.push_str(rest);
  out
}

/// Log-safe truncation for large strings (cuts on a char boundary).
/// Avoids spamming logs with huge prompts and model completions.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) { cut -= 1; }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

/// Misconception id as found in tabular exports: "", "NaN" and unparseable cells
/// are absent, float-formatted ids ("1672.0") are accepted.
pub fn parse_misconception_id(cell: &str) -> Option<i64> {
  let s = cell.trim();
  if s.is_empty() || s.eq_ignore_ascii_case("nan") {
    return None;
  }
  if let Ok(id) = s.parse::<i64>() {
    return Some(id);
  }
  match s.parse::<f64>() {
    Ok(f) if f.is_finite() && f.fract() == 0.0 => Some(f as i64),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_all_keys() {
    let out = fill_template("{a} and {b} and {a}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and y and x");
  }

  #[test]
  fn fill_template_does_not_expand_inside_values() {
    let out = fill_template("{a}|{b}", &[("a", "use {b}"), ("b", "W")]);
    assert_eq!(out, "use {b}|W");
    assert_eq!(fill_template("{unknown} {{a}}", &[("a", "x")]), "{unknown} {x}");
  }

  #[test]
  fn trunc_respects_char_boundaries() {
    let s = "ééééé";
    let t = trunc_for_log(s, 3);
    assert!(t.starts_with("é…"));
    assert_eq!(trunc_for_log("short", 10), "short");
  }

  #[test]
  fn misconception_ids_from_cells() {
    assert_eq!(parse_misconception_id("1672"), Some(1672));
    assert_eq!(parse_misconception_id(" 1672.0 "), Some(1672));
    assert_eq!(parse_misconception_id(""), None);
    assert_eq!(parse_misconception_id("NaN"), None);
    assert_eq!(parse_misconception_id("12.5"), None);
    assert_eq!(parse_misconception_id("abc"), None);
  }
}
