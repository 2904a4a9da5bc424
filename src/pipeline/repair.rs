//! Best-effort recovery of a JSON object from free-text model output.
//!
//! Handles code fences, prose around the object, trailing commas, raw control
//! characters inside strings, stray closers, and output cut off mid-stream.
//! Truncated input is closed at the last complete value; a partially written
//! string or key is dropped rather than kept half-finished.

use serde_json::Value;

pub fn repair_json(raw: &str) -> Option<String> {
    let body = strip_code_fence(raw);
    let start = body.find('{')?;
    let body = &body[start..];

    if let Some(end) = body.rfind('}') {
        let candidate = &body[..=end];
        if parses(candidate) {
            return Some(candidate.to_string());
        }
    }

    Repairer::default().run(body)
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after = &trimmed[start + 3..];
    let body = match after.find('\n') {
        Some(newline) if !after[..newline].contains('{') => &after[newline + 1..],
        _ => after,
    };
    match body.find("```") {
        Some(end) => body[..end].trim(),
        // Unterminated fence: the response was cut off.
        None => body.trim(),
    }
}

fn parses(candidate: &str) -> bool {
    serde_json::from_str::<Value>(candidate).is_ok()
}

fn strip_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}

fn close_at(prefix: &str, closers: &[char]) -> String {
    let mut closed = prefix.trim_end().to_string();
    strip_trailing_comma(&mut closed);
    if closed.ends_with(':') {
        closed.push_str("null");
    }
    closed.extend(closers.iter().rev());
    closed
}

fn ends_in_bare_scalar(out: &str) -> bool {
    out.chars()
        .last()
        .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '+'))
}

#[derive(Default)]
struct Repairer {
    out: String,
    /// Closing characters for every open container, innermost last.
    closers: Vec<char>,
    /// Output lengths after complete values, with the containers open at that point.
    checkpoints: Vec<(usize, Vec<char>)>,
    in_string: bool,
    escaped: bool,
    string_is_value: bool,
    after_colon: bool,
}

impl Repairer {
    fn run(mut self, body: &str) -> Option<String> {
        for ch in body.chars() {
            if self.in_string {
                self.push_string_char(ch);
                continue;
            }
            match ch {
                '"' => {
                    self.in_string = true;
                    self.string_is_value = self.after_colon || self.closers.last() == Some(&']');
                    self.after_colon = false;
                    self.out.push(ch);
                }
                '{' => self.open('}'),
                '[' => self.open(']'),
                '}' | ']' => {
                    if !self.closers.contains(&ch) {
                        continue;
                    }
                    strip_trailing_comma(&mut self.out);
                    while let Some(closer) = self.closers.pop() {
                        self.out.push(closer);
                        if closer == ch {
                            break;
                        }
                    }
                    self.after_colon = false;
                    if self.closers.is_empty() {
                        // Anything after the outermost object is commentary.
                        return Some(self.out);
                    }
                    self.checkpoint();
                }
                ',' => {
                    strip_trailing_comma(&mut self.out);
                    self.checkpoint();
                    self.out.push(',');
                    self.after_colon = false;
                }
                ':' => {
                    self.after_colon = true;
                    self.out.push(':');
                }
                _ => self.out.push(ch),
            }
        }
        self.close_truncated()
    }

    fn open(&mut self, closer: char) {
        self.closers.push(closer);
        self.after_colon = false;
        self.out.push(if closer == '}' { '{' } else { '[' });
    }

    fn checkpoint(&mut self) {
        self.checkpoints.push((self.out.len(), self.closers.clone()));
    }

    fn push_string_char(&mut self, ch: char) {
        if self.escaped {
            self.escaped = false;
            self.out.push(ch);
            return;
        }
        match ch {
            '\\' => {
                self.escaped = true;
                self.out.push(ch);
            }
            '"' => {
                self.in_string = false;
                self.out.push(ch);
                if self.string_is_value {
                    self.checkpoint();
                }
            }
            '\n' => self.out.push_str("\\n"),
            '\r' => self.out.push_str("\\r"),
            '\t' => self.out.push_str("\\t"),
            c if c.is_control() => {}
            _ => self.out.push(ch),
        }
    }

    fn close_truncated(self) -> Option<String> {
        // A number or literal at the very end may have been cut short
        // (`12` of `123`), so only a checkpoint before it is trusted.
        if !self.in_string && !ends_in_bare_scalar(&self.out) {
            let closed = close_at(&self.out, &self.closers);
            if parses(&closed) {
                return Some(closed);
            }
        }
        self.checkpoints
            .iter()
            .rev()
            .map(|(len, closers)| close_at(&self.out[..*len], closers))
            .find(|candidate| parses(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn repaired(raw: &str) -> Value {
        serde_json::from_str(&repair_json(raw).expect("repairable")).unwrap()
    }

    #[test]
    fn valid_json_passes_through() {
        let raw = r#"{"action":"none","workItems":[]}"#;
        assert_eq!(repair_json(raw).as_deref(), Some(raw));
    }

    #[test]
    fn strips_fence_and_prose() {
        let raw = "Sure! Here you go:\n```json\n{\"action\": \"delete\", \"workItems\": [{\"id\": 4}]}\n```\nLet me know.";
        assert_eq!(
            repaired(raw),
            json!({ "action": "delete", "workItems": [{ "id": 4 }] })
        );
    }

    #[test]
    fn removes_trailing_commas() {
        let raw = r#"{"action":"create","workItems":[{"title":"A",},],}"#;
        assert_eq!(
            repaired(raw),
            json!({ "action": "create", "workItems": [{ "title": "A" }] })
        );
    }

    #[test]
    fn escapes_raw_newlines_in_strings() {
        let raw = "{\"action\":\"create\",\"workItems\":[{\"title\":\"line one\nline two\"}]}";
        assert_eq!(repaired(raw)["workItems"][0]["title"], "line one\nline two");
    }

    #[test]
    fn ignores_text_after_the_object() {
        let raw = r#"{"action":"none","workItems":[]} and {"another": 1}"#;
        assert_eq!(repaired(raw), json!({ "action": "none", "workItems": [] }));
    }

    #[test]
    fn truncated_array_drops_the_partial_item() {
        let raw = r#"{"action":"batch-create","workItems":[{"title":"A","state":"New"},{"title":"B"#;
        assert_eq!(
            repaired(raw),
            json!({ "action": "batch-create", "workItems": [{ "title": "A", "state": "New" }] })
        );
    }

    #[test]
    fn truncated_after_complete_value_is_closed() {
        let raw = r#"{"action":"update","workItems":[{"id":7,"state":"Done""#;
        assert_eq!(
            repaired(raw),
            json!({ "action": "update", "workItems": [{ "id": 7, "state": "Done" }] })
        );
    }

    #[test]
    fn truncated_number_is_not_trusted() {
        let raw = r#"{"action":"delete","workItems":[{"id":12"#;
        assert_eq!(repaired(raw), json!({ "action": "delete" }));

        let raw = r#"{"action":"update","workItems":[{"id":7,"state":"Done","points":3"#;
        assert_eq!(
            repaired(raw),
            json!({ "action": "update", "workItems": [{ "id": 7, "state": "Done" }] })
        );
    }

    #[test]
    fn number_followed_by_space_is_complete() {
        let raw = "{\"action\":\"update\",\"workItems\":[{\"id\":7 ";
        assert_eq!(
            repaired(raw),
            json!({ "action": "update", "workItems": [{ "id": 7 }] })
        );
    }

    #[test]
    fn truncated_after_colon_falls_back() {
        let raw = r#"{"action":"update","workItems":[{"id":7,"state":"#;
        assert_eq!(
            repaired(raw),
            json!({ "action": "update", "workItems": [{ "id": 7, "state": null }] })
        );
    }

    #[test]
    fn stray_closers_are_skipped() {
        let raw = r#"{"action":"none"]}"#;
        assert_eq!(repaired(raw), json!({ "action": "none" }));
    }

    #[test]
    fn no_object_is_unrepairable() {
        assert_eq!(repair_json("I couldn't understand that request."), None);
        assert_eq!(repair_json(""), None);
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let raw = r#"{"action":"create","workItems":[{"title":"Say \"hi\"",}]"#;
        assert_eq!(repaired(raw)["workItems"][0]["title"], "Say \"hi\"");
    }
}
