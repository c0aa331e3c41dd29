//! Human-readable rendering of readings, shared by the console transport,
//! the MQTT listener and the `snapshot` command.
//!
//! ```text
//! mem
//! ---
//!
//! cache: 1234
//! mem
//! ...
//! ```
//!
//! Each nesting level underlines its title with the next character of
//! [`UNDERLINES`]; levels past the end use `/`.

use serde_json::Value;

/// Underline characters by nesting level.
pub const UNDERLINES: [char; 5] = ['=', '-', '.', ':', '+'];

const DEEP_UNDERLINE: char = '/';

/// Render `value` under `title`, starting at nesting `level`.
pub fn render(title: &str, value: &Value, level: usize) -> String {
    let mut out = String::new();
    render_into(&mut out, title, value, level);
    out
}

fn render_into(out: &mut String, title: &str, value: &Value, level: usize) {
    let underline = UNDERLINES.get(level).copied().unwrap_or(DEEP_UNDERLINE);
    out.push_str(title);
    out.push('\n');
    out.extend(std::iter::repeat_n(underline, title.chars().count()));
    out.push_str("\n\n");

    match value {
        Value::Object(map) => {
            for (key, item) in map {
                render_entry(out, key, item, level);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                render_entry(out, &format!("{title} {i}"), item, level);
            }
        }
        scalar => {
            out.push_str(&scalar_text(scalar));
            out.push('\n');
        }
    }
    out.push('\n');
}

fn render_entry(out: &mut String, key: &str, value: &Value, level: usize) {
    match value {
        Value::Object(_) => render_into(out, key, value, level + 1),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let title = format!("{key} {i}");
                if item.is_object() || item.is_array() {
                    render_into(out, &title, item, level + 1);
                } else {
                    out.push_str(&format!("{title}: {}\n", scalar_text(item)));
                }
            }
        }
        scalar => out.push_str(&format!("{key}: {}\n", scalar_text(scalar))),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_mapping() {
        let text = render("mem", &json!({"total": 200, "used": 100}), 0);
        assert_eq!(text, "mem\n===\n\ntotal: 200\nused: 100\n\n");
    }

    #[test]
    fn nested_levels_change_underline() {
        let text = render("fs", &json!({"/dev/sda1": {"type": "ext4", "used": 5}}), 1);
        assert!(text.starts_with("fs\n--\n\n"));
        assert!(text.contains("/dev/sda1\n.........\n\ntype: ext4\nused: 5\n"));
    }

    #[test]
    fn lists_are_numbered() {
        let text = render(
            "cpu",
            &json!({"percpu": [{"idle": 1.5}, {"idle": 2.5}]}),
            0,
        );
        assert!(text.contains("percpu 0\n--------\n\nidle: 1.5\n"));
        assert!(text.contains("percpu 1\n--------\n\nidle: 2.5\n"));
    }

    #[test]
    fn deep_levels_fall_back_to_slash() {
        let text = render("x", &json!({}), 9);
        assert_eq!(text, "x\n/\n\n\n");
    }
}
