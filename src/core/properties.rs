//! Flat `key=value` property files.
//!
//! Reads the Java `.properties` dialect (comments with `#`/`!`, `=`/`:`/space
//! separators, line continuations, backslash and `\uXXXX` escapes) and writes
//! a canonical form: sorted keys, one entry per line, everything that would
//! not survive a re-read escaped. Writing then reading reproduces every
//! key and value byte for byte.

use std::collections::BTreeMap;

/// A parse failure, with the 1-based physical line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub reason: String,
}

/// Parse property text into an ordered map. Later duplicates win.
pub fn parse(text: &str) -> Result<BTreeMap<String, String>, ParseError> {
    let mut entries = BTreeMap::new();
    let lines: Vec<&str> = text.split('\n').collect();
    let mut idx = 0usize;

    while idx < lines.len() {
        let start_line = idx + 1;
        let mut logical = String::new();

        loop {
            let raw = lines[idx].strip_suffix('\r').unwrap_or(lines[idx]);
            idx += 1;

            let segment = if logical.is_empty() {
                raw
            } else {
                raw.trim_start_matches(is_blank)
            };

            if logical.is_empty() && is_comment_or_blank(segment) {
                break;
            }

            if ends_with_unescaped_backslash(segment) && idx < lines.len() {
                logical.push_str(&segment[..segment.len() - 1]);
                continue;
            }

            logical.push_str(segment);
            break;
        }

        if logical.is_empty() {
            continue;
        }

        let (key, value) = split_entry(&logical).map_err(|reason| ParseError {
            line: start_line,
            reason,
        })?;
        entries.insert(key, value);
    }

    Ok(entries)
}

/// Render entries in canonical form, preceded by an optional comment.
pub fn write(entries: &BTreeMap<String, String>, comment: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(comment) = comment {
        for line in comment.lines() {
            out.push('#');
            out.push_str(line);
            out.push('\n');
        }
    }
    for (key, value) in entries {
        out.push_str(&escape(key, true));
        out.push('=');
        out.push_str(&escape(value, false));
        out.push('\n');
    }
    out
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0C')
}

fn is_comment_or_blank(line: &str) -> bool {
    let trimmed = line.trim_start_matches(is_blank);
    trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!')
}

fn ends_with_unescaped_backslash(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> Result<(String, String), String> {
    let body = line.trim_start_matches(is_blank);
    let chars: Vec<char> = body.chars().collect();

    let mut i = 0usize;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '=' | ':' => break,
            c if is_blank(c) => break,
            _ => i += 1,
        }
    }
    let key_end = i.min(chars.len());

    while i < chars.len() && is_blank(chars[i]) {
        i += 1;
    }
    if i < chars.len() && (chars[i] == '=' || chars[i] == ':') {
        i += 1;
    }
    while i < chars.len() && is_blank(chars[i]) {
        i += 1;
    }

    let key: String = chars[..key_end].iter().collect();
    let value: String = chars[i.min(chars.len())..].iter().collect();

    let key = unescape(&key)?;
    if key.is_empty() {
        return Err("entry has an empty key".to_string());
    }
    let value = unescape(&value)?;
    Ok((key, value))
}

fn unescape(s: &str) -> Result<String, String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            None => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0C'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 {
                    return Err(format!("truncated unicode escape `\\u{}`", hex));
                }
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| format!("malformed unicode escape `\\u{}`", hex))?;
                let ch = char::from_u32(code)
                    .ok_or_else(|| format!("unicode escape `\\u{}` is not a character", hex))?;
                out.push(ch);
            }
            Some(other) => out.push(other),
        }
    }

    Ok(out)
}

fn escape(s: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0C' => out.push_str("\\f"),
            '=' | ':' if is_key => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            '#' | '!' if i == 0 => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_basic() {
        let text = "# comment\n! other\n\nx86_64-MacOSX-g++.libs.binding=shared\noutput : foo-1.0\nplain value\n";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed["x86_64-MacOSX-g++.libs.binding"], "shared");
        assert_eq!(parsed["output"], "foo-1.0");
        assert_eq!(parsed["plain"], "value");
    }

    #[test]
    fn test_parse_continuation_and_escapes() {
        let text = "libs.names=foo \\\n    bar\nunicode=\\u0041\\tB\r\n";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed["libs.names"], "foo bar");
        assert_eq!(parsed["unicode"], "A\tB");
    }

    #[test]
    fn test_parse_rejects_bad_escape() {
        let err = parse("ok=1\nbad=\\u12G4\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(parse("bad=\\u12").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_key() {
        let err = parse("=value\n").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_write_is_sorted_and_commented() {
        let text = write(&map(&[("b", "2"), ("a", "1")]), Some("NAR Properties"));
        assert_eq!(text, "#NAR Properties\na=1\nb=2\n");
    }

    #[test]
    fn test_round_trip_awkward_values() {
        let entries = map(&[
            ("x86_64-MacOSX-g++.libs.binding", "shared"),
            ("linker.options", "-Wl,--as-needed -lm"),
            ("key with space", " leading space"),
            ("k=v:w", "a=b:c"),
            ("path", "C:\\tools\\bin"),
            ("hash", "#not a comment"),
            ("multi", "line1\nline2\ttabbed"),
            ("empty", ""),
            ("unicode", "ünïcødé"),
        ]);
        let text = write(&entries, Some("comment"));
        assert_eq!(parse(&text).unwrap(), entries);
    }
}
