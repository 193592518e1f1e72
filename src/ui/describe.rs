//! Detail view: scope header plus highlighted JSON
//!
//! JSON colors:
//! - Keys in cyan
//! - Strings in green
//! - Numbers in light blue
//! - Booleans in magenta
//! - Null values in dark gray

use crate::resource::{Renderer, ResourceItem};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

/// Lines of the detail view for `item`
pub fn detail_lines(renderer: &dyn Renderer, item: &ResourceItem) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let field = |name: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{:<10}", name), label),
            Span::raw(value),
        ])
    };

    let mut lines = vec![
        field("Kind", item.kind().to_string()),
        field("Id", item.id()),
        field("Name", item.name().to_string()),
    ];

    if let Some(scope) = item.scope() {
        lines.push(field("Region", scope.region.to_string()));
        if let Some(selection) = &scope.selection {
            lines.push(field("Identity", selection.display_name().to_string()));
            lines.push(field(
                "Account",
                scope.account_id.clone().unwrap_or_else(|| "-".to_string()),
            ));
        }
    }

    if !item.tags().is_empty() {
        let tags = item
            .tags()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(field("Labels", tags));
    }

    lines.push(Line::default());
    lines.extend(renderer.detail(item.resource()).lines().map(highlight_json_line));
    lines
}

/// Apply JSON syntax highlighting to a single line
pub fn highlight_json_line(line: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = line.chars().peekable();
    let mut current = String::new();

    let flush = |current: &mut String, spans: &mut Vec<Span<'static>>| {
        if !current.is_empty() {
            let style = get_json_value_style(current);
            spans.push(Span::styled(std::mem::take(current), style));
        }
    };

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if !current.is_empty() {
                    spans.push(Span::raw(std::mem::take(&mut current)));
                }

                let mut string_content = String::from("\"");
                while let Some(next_c) = chars.next() {
                    string_content.push(next_c);
                    if next_c == '"' {
                        break;
                    }
                    if next_c == '\\' {
                        if let Some(escaped) = chars.next() {
                            string_content.push(escaped);
                        }
                    }
                }

                // a string directly followed by ':' is a key
                let style = if chars.peek() == Some(&':') {
                    Style::default().fg(Color::Cyan)
                } else {
                    Style::default().fg(Color::Green)
                };
                spans.push(Span::styled(string_content, style));
            }
            ':' => {
                current.push(c);
                spans.push(Span::styled(std::mem::take(&mut current), Style::default().fg(Color::White)));
            }
            ',' => {
                flush(&mut current, &mut spans);
                spans.push(Span::styled(",".to_string(), Style::default().fg(Color::White)));
            }
            '{' | '}' | '[' | ']' => {
                flush(&mut current, &mut spans);
                spans.push(Span::styled(c.to_string(), Style::default().fg(Color::Yellow)));
            }
            ' ' | '\t' => {
                flush(&mut current, &mut spans);
                spans.push(Span::raw(c.to_string()));
            }
            _ => current.push(c),
        }
    }

    flush(&mut current, &mut spans);
    Line::from(spans)
}

/// Get style for JSON values (numbers, booleans, null)
fn get_json_value_style(value: &str) -> Style {
    let trimmed = value.trim();
    if trimmed == "null" {
        Style::default().fg(Color::DarkGray)
    } else if trimmed == "true" || trimmed == "false" {
        Style::default().fg(Color::Magenta)
    } else if trimmed.parse::<f64>().is_ok() {
        Style::default().fg(Color::LightBlue)
    } else {
        Style::default().fg(Color::White)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Region, Selection};
    use crate::resource::{
        ColumnRenderer, Resource, ResourceKind, ResourceScope, ScopedResource,
    };
    use serde_json::json;

    fn span_color(line: &Line, text: &str) -> Option<Color> {
        line.spans
            .iter()
            .find(|s| s.content == text)
            .and_then(|s| s.style.fg)
    }

    #[test]
    fn test_highlight_key_and_values() {
        let line = highlight_json_line(r#"  "status": "RUNNING","#);
        assert_eq!(span_color(&line, "\"status\""), Some(Color::Cyan));
        assert_eq!(span_color(&line, "\"RUNNING\""), Some(Color::Green));

        let line = highlight_json_line(r#"  "count": 3,"#);
        assert_eq!(span_color(&line, "3"), Some(Color::LightBlue));

        let line = highlight_json_line(r#"  "preemptible": false"#);
        assert_eq!(span_color(&line, "false"), Some(Color::Magenta));

        let line = highlight_json_line(r#"    "a","#);
        assert_eq!(span_color(&line, "\"a\""), Some(Color::Green));
    }

    #[test]
    fn test_detail_lines_show_scope() {
        let resource = Resource::new(ResourceKind::new("storage", "buckets"), "logs", "logs")
            .with_tag("env", "prod")
            .with_raw(json!({"name": "logs"}));
        let item = ResourceItem::Scoped(ScopedResource::new(
            resource,
            ResourceScope::identity(Region::global(), Selection::Named("prod".into()), None),
        ));

        let text: Vec<String> = detail_lines(&ColumnRenderer::new("Buckets", vec![]), &item)
            .iter()
            .map(|l| l.to_string())
            .collect();

        assert!(text.iter().any(|l| l.starts_with("Id") && l.contains("prod/global/logs")));
        assert!(text.iter().any(|l| l.starts_with("Account") && l.ends_with('-')));
        assert!(text.iter().any(|l| l.contains("env=prod")));
        assert!(text.iter().any(|l| l.contains("\"name\": \"logs\"")));
    }
}
