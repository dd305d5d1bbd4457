//! Rendering simplified errors into response bodies.

use crate::extract::SimplifiedError;

const PLACEHOLDERS: [&str; 3] = ["{{error}}", "{{message}}", "{{kind}}"];

/// Produce the body of a default error response.
///
/// Without a template the error is rendered as plain text. A template may
/// reference `{{error}}`, `{{message}}` and `{{kind}}`, which are replaced
/// with HTML-escaped values; a template without placeholders is sent as is.
pub fn format_error(template: Option<&str>, error: &SimplifiedError) -> String {
    let text = render_text(error);

    let Some(template) = template.filter(|t| !t.trim().is_empty()) else {
        return text;
    };

    if !PLACEHOLDERS.iter().any(|p| template.contains(p)) {
        return template.to_string();
    }

    // Substituted text is never expanded again.
    let mut out = String::with_capacity(template.len() + text.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let token = &rest[start..];
        match PLACEHOLDERS.iter().find(|p| token.starts_with(**p)) {
            Some(&placeholder) => {
                match placeholder {
                    "{{error}}" => out.push_str(&html_escape(&text)),
                    "{{message}}" => out.push_str(&html_escape(message_or_default(error))),
                    _ => out.push_str(error.kind().as_str()),
                }
                rest = &token[placeholder.len()..];
            }
            None => {
                out.push_str("{{");
                rest = &token[2..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn message_or_default(error: &SimplifiedError) -> &str {
    match error.message().trim() {
        "" => "Unknown error",
        _ => error.message(),
    }
}

fn render_text(error: &SimplifiedError) -> String {
    let mut out = format!("{}: {}", error.kind(), message_or_default(error));

    if let Some(stack) = error.stack() {
        out.push('\n');
        out.push_str(stack.trim_end());
    }

    if let Some(original) = error.original_error() {
        out.push_str("\n\nOriginal error:\n");
        for line in render_text(original).lines() {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
        out.truncate(out.trim_end().len());
    }

    out
}

/// Simple HTML escape for error messages.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use render_core::ErrorKind;

    #[test]
    fn test_plain_rendering() {
        let err = SimplifiedError::new(ErrorKind::TransientService, "boom");
        assert_eq!(format_error(None, &err), "TransientService: boom");
    }

    #[test]
    fn test_empty_message_degrades() {
        let err = SimplifiedError::new(ErrorKind::Internal, "   ");
        assert_eq!(format_error(None, &err), "Internal: Unknown error");
    }

    #[test]
    fn test_nested_original() {
        let original = SimplifiedError::new(ErrorKind::InvalidInput, "Missing url query param");
        let err = SimplifiedError::new(ErrorKind::Internal, "hook exploded").with_original(original);

        let body = format_error(None, &err);
        assert_eq!(
            body,
            "Internal: hook exploded\n\nOriginal error:\n    InvalidInput: Missing url query param"
        );
    }

    #[test]
    fn test_template_without_placeholders_is_verbatim() {
        let err = SimplifiedError::new(ErrorKind::Internal, "boom");
        let body = format_error(Some("<h1>Something went wrong</h1>"), &err);
        assert_eq!(body, "<h1>Something went wrong</h1>");
    }

    #[test]
    fn test_template_placeholders_are_escaped() {
        let err = SimplifiedError::new(ErrorKind::Internal, "<script>");
        let body = format_error(Some("<p>{{kind}}</p><pre>{{message}}</pre>"), &err);
        assert_eq!(body, "<p>Internal</p><pre>&lt;script&gt;</pre>");
    }

    #[test]
    fn test_blank_template_falls_back() {
        let err = SimplifiedError::new(ErrorKind::Internal, "boom");
        assert_eq!(format_error(Some(""), &err), "Internal: boom");
    }

    #[test]
    fn test_inserted_text_is_not_expanded() {
        let err = SimplifiedError::new(ErrorKind::Internal, "bad token {{kind}}");
        assert_eq!(
            format_error(Some("<pre>{{error}}</pre>"), &err),
            "<pre>Internal: bad token {{kind}}</pre>"
        );
        assert_eq!(
            format_error(Some("{{message}} / {{kind}}"), &err),
            "bad token {{kind}} / Internal"
        );
    }

    #[test]
    fn test_unknown_braces_kept() {
        let err = SimplifiedError::new(ErrorKind::NotAllowed, "x");
        assert_eq!(
            format_error(Some("{{other}} {{kind}} {{"), &err),
            "{{other}} NotAllowed {{"
        );
    }
}
