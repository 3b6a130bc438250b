//! Entry-document decomposition into replay steps.
//!
//! One step per top-level element of `<body>`, in document order. Malformed
//! HTML is never a hard failure: the parser produces a best-effort structure
//! and missing pieces come out as empty lists.

use serde::{Deserialize, Serialize};

/// Delay of the first step, in milliseconds.
pub const STEP_BASE_DELAY_MS: u64 = 420;

/// Per-index delay increment, in milliseconds. Together with the base this
/// gives `420 + 80 * index`: later steps animate slightly slower. The ramp is
/// part of the observable pacing contract and is kept exactly as-is.
pub const STEP_DELAY_INCREMENT_MS: u64 = 80;

/// Maximum characters of step text carried to the shell.
const STEP_TEXT_LIMIT: usize = 240;

/// One animated unit of a replay run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub tag: String,
    pub id_attr: String,
    pub class_attr: String,
    pub text: String,
    pub delay_ms: u64,
    /// Explicit display-time override. The step builder never sets it, but
    /// the replay-duration estimate honors it when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_ms: Option<u64>,
}

/// Everything the shell needs from the entry document.
#[derive(Debug, Default)]
pub struct DocumentPlan {
    /// Stylesheet hrefs in document order.
    pub stylesheets: Vec<String>,
    /// Replay steps in document order.
    pub steps: Vec<Step>,
}

/// Decompose an HTML document into stylesheets and paced steps.
pub fn decompose(html: &str) -> DocumentPlan {
    let Ok(dom) = tl::parse(html, tl::ParserOptions::default()) else {
        return DocumentPlan::default();
    };
    let parser = dom.parser();

    DocumentPlan {
        stylesheets: collect_stylesheets(&dom, parser),
        steps: body_element_steps(&dom, parser),
    }
}

/// Hrefs of every `<link rel="stylesheet">`, preserving document order and
/// skipping other link kinds (icons, preloads).
fn collect_stylesheets(dom: &tl::VDom, parser: &tl::Parser) -> Vec<String> {
    let mut styles = Vec::new();
    let Some(links) = dom.query_selector("link") else {
        return styles;
    };

    for handle in links {
        let Some(tag) = handle.get(parser).and_then(|node| node.as_tag()) else {
            continue;
        };
        if attribute(tag, "rel").as_deref() != Some("stylesheet") {
            continue;
        }
        if let Some(href) = attribute(tag, "href")
            && !href.is_empty()
        {
            styles.push(href);
        }
    }

    styles
}

/// One step per top-level element child of `<body>`; text nodes and comments
/// between them are skipped.
fn body_element_steps(dom: &tl::VDom, parser: &tl::Parser) -> Vec<Step> {
    let Some(body) = dom
        .query_selector("body")
        .and_then(|mut hits| hits.next())
        .and_then(|handle| handle.get(parser))
        .and_then(|node| node.as_tag())
    else {
        return Vec::new();
    };

    let mut steps = Vec::new();
    for handle in body.children().top().iter() {
        let Some(tag) = handle.get(parser).and_then(|node| node.as_tag()) else {
            continue;
        };
        let index = steps.len();
        steps.push(element_step(tag, parser, index));
    }
    steps
}

fn element_step(tag: &tl::HTMLTag, parser: &tl::Parser, index: usize) -> Step {
    Step {
        id: format!("step-{}", index + 1),
        tag: tag.name().as_utf8_str().to_lowercase(),
        id_attr: attribute(tag, "id").unwrap_or_default(),
        class_attr: attribute(tag, "class").unwrap_or_default(),
        text: normalize_text(&tag.inner_text(parser)),
        delay_ms: STEP_BASE_DELAY_MS + STEP_DELAY_INCREMENT_MS * index as u64,
        estimated_ms: None,
    }
}

/// Attribute value by name, or `None` when absent or valueless.
fn attribute(tag: &tl::HTMLTag, name: &str) -> Option<String> {
    tag.attributes()
        .iter()
        .find_map(|(key, value)| {
            let key: &str = key.as_ref();
            (key == name).then(|| value.map(|v| v.to_string()))
        })
        .flatten()
}

/// Collapse whitespace runs to single spaces, trim, cap at the text limit.
fn normalize_text(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= STEP_TEXT_LIMIT {
        collapsed
    } else {
        collapsed.chars().take(STEP_TEXT_LIMIT).collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_element_body() {
        let plan = decompose(
            r#"<html><body><h1 class="title">Hi</h1><p id="p1">There</p></body></html>"#,
        );

        assert_eq!(plan.steps.len(), 2);

        let first = &plan.steps[0];
        assert_eq!(first.id, "step-1");
        assert_eq!(first.tag, "h1");
        assert_eq!(first.class_attr, "title");
        assert_eq!(first.id_attr, "");
        assert_eq!(first.text, "Hi");
        assert_eq!(first.delay_ms, 420);

        let second = &plan.steps[1];
        assert_eq!(second.id, "step-2");
        assert_eq!(second.tag, "p");
        assert_eq!(second.id_attr, "p1");
        assert_eq!(second.text, "There");
        assert_eq!(second.delay_ms, 500);
    }

    #[test]
    fn test_delay_ramp_grows_per_index() {
        let html = "<body><div>a</div><div>b</div><div>c</div><div>d</div></body>";
        let plan = decompose(html);
        let delays: Vec<u64> = plan.steps.iter().map(|s| s.delay_ms).collect();
        assert_eq!(delays, vec![420, 500, 580, 660]);
    }

    #[test]
    fn test_text_nodes_between_elements_skipped() {
        let plan = decompose("<body>\n  <h1>Hi</h1>\n  loose text\n  <p>There</p>\n</body>");
        let tags: Vec<&str> = plan.steps.iter().map(|s| s.tag.as_str()).collect();
        assert_eq!(tags, vec!["h1", "p"]);
    }

    #[test]
    fn test_nested_text_flattened_and_collapsed() {
        let plan = decompose("<body><div><b>Hello</b>\n   <i>world</i></div></body>");
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].text, "Hello world");
    }

    #[test]
    fn test_text_truncated_to_limit() {
        let long = "x".repeat(600);
        let plan = decompose(&format!("<body><p>{long}</p></body>"));
        assert_eq!(plan.steps[0].text.chars().count(), 240);
    }

    #[test]
    fn test_stylesheets_in_document_order_skipping_other_rels() {
        let plan = decompose(concat!(
            "<html><head>",
            r#"<link rel="stylesheet" href="a.css">"#,
            r#"<link rel="icon" href="favicon.ico">"#,
            r#"<link rel="stylesheet" href="b.css">"#,
            r#"<link rel="stylesheet">"#,
            "</head><body></body></html>",
        ));
        assert_eq!(plan.stylesheets, vec!["a.css", "b.css"]);
    }

    #[test]
    fn test_missing_body_yields_no_steps() {
        let plan = decompose("<html><head><title>t</title></head></html>");
        assert!(plan.steps.is_empty());
    }

    #[test]
    fn test_malformed_html_is_best_effort() {
        let plan = decompose("<body><h1>unclosed<p>still here");
        assert!(!plan.steps.is_empty());
    }

    #[test]
    fn test_step_wire_format() {
        let plan = decompose(r#"<body><h1 class="t" id="h">Hi</h1></body>"#);
        let value = serde_json::to_value(&plan.steps[0]).unwrap();
        assert_eq!(value["idAttr"], "h");
        assert_eq!(value["classAttr"], "t");
        assert_eq!(value["delayMs"], 420);
        assert!(value.get("estimatedMs").is_none());
    }
}
