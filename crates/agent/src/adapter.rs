//! Adapters for the upstream's response shapes.
//!
//! The agent service changed how it reports output several times. Each shape
//! is one variant here instead of one copy of the route per version:
//! [`ContentExtraction`] picks how `output_content` becomes display text and
//! [`row_content`] / [`row_role`] read list rows from any generation.

pub use relay_core::{ApiFlavor, ContentExtraction};

use crate::types::{ContentItem, PendingResponse, Role};

/// Render one content item: optional title line, body, and a link line for
/// `url` items. Returns `None` when nothing visible remains.
fn render_item(item: &ContentItem) -> Option<String> {
    let mut out = String::new();
    if let Some(title) = &item.title {
        out.push_str(title);
        out.push('\n');
    }
    if let Some(content) = &item.content {
        out.push_str(content);
    }
    if item.is_kind("url") {
        if let Some(url) = &item.url {
            match &item.title {
                Some(title) => out.push_str(&format!("\n\n{title}: {url}")),
                None => out.push_str(&format!("\n\n🔗 {url}")),
            }
        }
    }
    if out.trim().is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Display text for a completed response, or `None` when no item is usable.
pub fn extract_content(items: &[ContentItem], extraction: ContentExtraction) -> Option<String> {
    let parts: Vec<String> = match extraction {
        ContentExtraction::Concatenate => items.iter().filter_map(render_item).collect(),
        ContentExtraction::PreferMarkdown => {
            let primary = items
                .iter()
                .find(|i| i.is_kind("markdown"))
                .or_else(|| items.iter().find(|i| i.is_kind("text")));
            primary
                .into_iter()
                .chain(items.iter().filter(|i| i.is_kind("url")))
                .filter_map(render_item)
                .collect()
        }
    };
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Older list endpoints mix user and agent rows; a row that carries input is
/// the user's side of the exchange.
pub fn row_role(response: &PendingResponse) -> Role {
    if response.input_content.is_empty() {
        Role::Agent
    } else {
        Role::User
    }
}

/// Text of a list row across upstream generations: first output `text` item,
/// else the `final` segment, else the first input `text` item. Empty text
/// counts as missing.
pub fn row_content(response: &PendingResponse) -> String {
    let first_text = |items: &[ContentItem]| {
        items
            .iter()
            .find(|i| i.is_kind("text"))
            .and_then(|i| i.content.clone())
            .filter(|c| !c.is_empty())
    };
    first_text(&response.output_content)
        .or_else(|| {
            response
                .segments
                .iter()
                .find(|s| s.kind.as_deref() == Some("final"))
                .and_then(|s| s.text.clone())
                .filter(|t| !t.is_empty())
        })
        .or_else(|| first_text(&response.input_content))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Segment;

    fn item(kind: &str, content: Option<&str>) -> ContentItem {
        ContentItem {
            kind: Some(kind.to_string()),
            content: content.map(str::to_string),
            ..Default::default()
        }
    }

    fn url_item(title: Option<&str>, url: &str) -> ContentItem {
        ContentItem {
            kind: Some("url".to_string()),
            title: title.map(str::to_string),
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn single_markdown_item_is_returned_verbatim() {
        let items = vec![item("markdown", Some("X"))];
        for mode in [ContentExtraction::Concatenate, ContentExtraction::PreferMarkdown] {
            assert_eq!(extract_content(&items, mode).as_deref(), Some("X"));
        }
    }

    #[test]
    fn titled_url_item_renders_link_line() {
        let items = vec![url_item(Some("Report"), "http://x")];
        let text = extract_content(&items, ContentExtraction::Concatenate).unwrap();
        assert!(text.starts_with("Report\n"));
        assert!(text.ends_with("Report: http://x"));
    }

    #[test]
    fn untitled_url_item_uses_link_marker() {
        let items = vec![url_item(None, "http://x")];
        let text = extract_content(&items, ContentExtraction::Concatenate).unwrap();
        assert_eq!(text, "\n\n🔗 http://x");
    }

    #[test]
    fn concatenate_joins_with_blank_line_and_skips_blank_items() {
        let items = vec![
            item("text", Some("first")),
            item("text", Some("   ")),
            item("markdown", Some("second")),
        ];
        assert_eq!(
            extract_content(&items, ContentExtraction::Concatenate).as_deref(),
            Some("first\n\nsecond")
        );
    }

    #[test]
    fn prefer_markdown_picks_markdown_over_earlier_text() {
        let items = vec![
            item("text", Some("plain")),
            item("markdown", Some("# rich")),
            url_item(Some("Site"), "http://x"),
        ];
        let text = extract_content(&items, ContentExtraction::PreferMarkdown).unwrap();
        assert!(text.starts_with("# rich\n\n"));
        assert!(!text.contains("plain"));
        assert!(text.contains("Site: http://x"));
    }

    #[test]
    fn prefer_markdown_falls_back_to_text() {
        let items = vec![item("tool_call", Some("ignored")), item("text", Some("hello"))];
        assert_eq!(
            extract_content(&items, ContentExtraction::PreferMarkdown).as_deref(),
            Some("hello")
        );
    }

    #[test]
    fn empty_output_yields_none() {
        assert_eq!(extract_content(&[], ContentExtraction::Concatenate), None);
        assert_eq!(extract_content(&[], ContentExtraction::PreferMarkdown), None);
    }

    #[test]
    fn list_rows_detect_role_from_input() {
        let mut resp = PendingResponse {
            id: "r1".into(),
            input_content: vec![item("text", Some("question"))],
            ..Default::default()
        };
        assert_eq!(row_role(&resp), Role::User);
        assert_eq!(row_content(&resp), "question");

        resp.output_content = vec![item("text", Some("answer"))];
        assert_eq!(row_content(&resp), "answer");

        resp.input_content.clear();
        assert_eq!(row_role(&resp), Role::Agent);
    }

    #[test]
    fn list_rows_fall_back_to_final_segment() {
        let resp = PendingResponse {
            id: "r2".into(),
            segments: vec![
                Segment {
                    kind: Some("thinking".into()),
                    text: Some("hmm".into()),
                },
                Segment {
                    kind: Some("final".into()),
                    text: Some("done".into()),
                },
            ],
            ..Default::default()
        };
        assert_eq!(row_content(&resp), "done");
        assert_eq!(row_content(&PendingResponse::default()), "");
    }

    #[test]
    fn empty_row_text_falls_through() {
        let resp = PendingResponse {
            id: "r3".into(),
            output_content: vec![item("text", Some(""))],
            segments: vec![Segment {
                kind: Some("final".into()),
                text: Some("from segment".into()),
            }],
            input_content: vec![item("text", Some("question"))],
            ..Default::default()
        };
        assert_eq!(row_content(&resp), "from segment");

        let resp = PendingResponse {
            segments: vec![Segment {
                kind: Some("final".into()),
                text: Some(String::new()),
            }],
            ..resp
        };
        assert_eq!(row_content(&resp), "question");
    }
}
