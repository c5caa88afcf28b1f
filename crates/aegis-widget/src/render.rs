//! Fallback markup
//!
//! Output is deterministic for a given fallback so hosts and tests can
//! match on markers instead of layout.

use crate::fallback::{Fallback, FallbackAction};
use std::fmt::Write;

/// Class carried by every fallback container
pub const CONTAINER_MARKER: &str = "aegis-widget-fallback";

/// Text of the fragment rendered for an unknown fallback id
pub const GENERIC_MESSAGE: &str = "This widget is currently unavailable.";

/// Escape text for inclusion in an HTML text node
///
/// Quotes are left alone so fault text reads back verbatim.
#[must_use]
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape text for inclusion in a quoted attribute value
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Render a fallback as an HTML fragment
#[must_use]
pub fn render(fallback: &Fallback) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        r#"<div class="{CONTAINER_MARKER}" data-fallback-id="{}" data-widget-id="{}" data-severity="{}" role="alert">"#,
        fallback.id,
        escape_html(&fallback.widget_id),
        fallback.severity,
    );
    let _ = write!(
        html,
        r#"<p class="{CONTAINER_MARKER}__content">{}</p>"#,
        escape_text(&fallback.content)
    );
    if !fallback.error_message.is_empty() {
        let _ = write!(
            html,
            r#"<p class="{CONTAINER_MARKER}__error">{}</p>"#,
            escape_text(&fallback.error_message)
        );
    }

    let _ = write!(html, r#"<div class="{CONTAINER_MARKER}__actions">"#);
    for action in &fallback.actions {
        let disabled = *action == FallbackAction::Retry && !fallback.show_retry
            || *action == FallbackAction::Remove && !fallback.show_remove;
        let _ = write!(
            html,
            r#"<button type="button" data-action="{}"{}>{}</button>"#,
            action.as_str(),
            if disabled { " disabled" } else { "" },
            action.label(),
        );
    }
    html.push_str("</div></div>");
    html
}

/// Fragment rendered when no fallback exists for the requested id
#[must_use]
pub fn render_generic() -> String {
    format!(
        r#"<div class="{CONTAINER_MARKER} {CONTAINER_MARKER}--generic" role="alert"><p class="{CONTAINER_MARKER}__content">{GENERIC_MESSAGE}</p></div>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::WidgetErrorRecord;
    use aegis_core::Fault;

    fn fallback(message: &str) -> Fallback {
        let record = WidgetErrorRecord::first("w1", "p1", &Fault::new(message));
        Fallback::build(&record, true, true)
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html(r#"<b>"a" & 'b'</b>"#), "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;");
        assert_eq!(escape_html("plain text"), "plain text");
    }

    #[test]
    fn text_escape_keeps_quotes() {
        assert_eq!(escape_text(r#"<b>"a" & 'b'</b>"#), r#"&lt;b&gt;"a" &amp; 'b'&lt;/b&gt;"#);
    }

    #[test]
    fn quoted_message_reads_back_verbatim() {
        let message = r#"Cannot read property 'map' of undefined (key "items")"#;
        let html = render(&fallback(message));
        assert!(html.contains(message));
    }

    #[test]
    fn widget_id_attribute_fully_escaped() {
        let record = WidgetErrorRecord::first(r#"w"1'"#, "p1", &Fault::new("x"));
        let html = render(&Fallback::build(&record, true, true));
        assert!(html.contains(r#"data-widget-id="w&quot;1&#39;""#));
    }

    #[test]
    fn render_contains_markers() {
        let html = render(&fallback("Chart data failed to load"));
        assert!(html.contains(CONTAINER_MARKER));
        assert!(html.contains("Chart data failed to load"));
        assert!(html.contains(r#"data-action="retry""#));
        assert!(html.contains(r#"data-action="remove""#));
        assert!(html.contains(r#"data-action="report""#));
        assert!(html.contains(r#"data-widget-id="w1""#));
    }

    #[test]
    fn render_is_deterministic() {
        let f = fallback("boom");
        assert_eq!(render(&f), render(&f));
    }

    #[test]
    fn script_in_message_neutralised() {
        let html = render(&fallback("<script>alert(1)</script>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn empty_message_omits_error_paragraph() {
        let html = render(&fallback(""));
        assert!(!html.contains("__error"));
    }

    #[test]
    fn generic_fragment() {
        let html = render_generic();
        assert!(html.contains(CONTAINER_MARKER));
        assert!(html.contains(GENERIC_MESSAGE));
        assert!(!html.contains("data-action"));
    }
}
