//! Main-content text extraction for HTML pages.
//!
//! Turns an arbitrary HTML document into a bounded block of readable text
//! using ordered fallback strategies; the first that produces usable text
//! wins:
//!
//! 1. **Landmark search**: the first element matched by each selector in
//!    [`LANDMARK_SELECTORS`], in order. Accepted when its trimmed rendered
//!    text exceeds 200 characters. The first accepted selector wins, not the
//!    longest text.
//! 2. **Paragraph aggregation**: every `<p>` whose trimmed text exceeds 20
//!    characters, joined with a blank line. Accepted if longer than what
//!    step 1 produced.
//! 3. **Body fallback**: when the result is still under 100 characters, the
//!    `<body>` of a *copy* of the document with [`NON_CONTENT_SELECTOR`]
//!    regions detached.
//!
//! The result is then whitespace-normalized (see [`normalize_whitespace`]).
//! Extraction never fails and never mutates the caller's document; a page
//! with no usable text yields an empty [`ExtractedText`]. Length capping is
//! the orchestrator's job.

use anyhow::Result;
use scraper::{ElementRef, Html, Node, Selector};

use crate::models::ExtractedText;
use crate::page::PageSource;

/// Structural selectors that usually denote primary content, in priority order.
pub const LANDMARK_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-content",
    ".main-content",
    "#content",
];

/// Regions removed from the body copy before the whole-document fallback.
pub const NON_CONTENT_SELECTOR: &str =
    "nav, header, footer, aside, .navigation, .menu, .sidebar, .ads, .advertisement";

const LANDMARK_MIN_CHARS: usize = 200;
const PARAGRAPH_MIN_CHARS: usize = 20;
const FALLBACK_THRESHOLD: usize = 100;

/// Elements whose text never renders.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements rendered on their own line.
const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "dd",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "main",
    "nav",
    "ol",
    "pre",
    "section",
    "table",
    "tr",
    "ul",
];

/// Extract normalized main-content text from raw HTML.
pub fn extract_html(html: &str) -> ExtractedText {
    let document = Html::parse_document(html);
    extract(&document)
}

/// Extract normalized main-content text from a parsed document.
pub fn extract(document: &Html) -> ExtractedText {
    let mut text = landmark_text(document).unwrap_or_default();

    if char_len(&text) < LANDMARK_MIN_CHARS {
        tracing::debug!("no landmark matched, trying paragraph aggregation");
        let paragraphs = paragraph_text(document);
        if char_len(&paragraphs) > char_len(&text) {
            text = paragraphs;
        }
    }

    if char_len(&text) < FALLBACK_THRESHOLD {
        tracing::debug!("using body fallback");
        text = body_fallback_text(document);
    }

    let content = normalize_whitespace(&text);
    tracing::debug!(chars = content.chars().count(), "extracted page text");
    ExtractedText::new(content)
}

fn landmark_text(document: &Html) -> Option<String> {
    for selector_str in LANDMARK_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = rendered_text(element);
            if char_len(text.trim()) > LANDMARK_MIN_CHARS {
                tracing::debug!(selector = selector_str, "found content landmark");
                return Some(text);
            }
        }
    }
    None
}

fn paragraph_text(document: &Html) -> String {
    let Ok(selector) = Selector::parse("p") else {
        return String::new();
    };
    document
        .select(&selector)
        .map(|p| rendered_text(p).trim().to_string())
        .filter(|t| char_len(t) > PARAGRAPH_MIN_CHARS)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn body_fallback_text(document: &Html) -> String {
    let (Ok(body_selector), Ok(unwanted)) = (
        Selector::parse("body"),
        Selector::parse(NON_CONTENT_SELECTOR),
    ) else {
        return String::new();
    };

    let mut copy = document.clone();
    let doomed: Vec<_> = copy.select(&unwanted).map(|el| el.id()).collect();
    for id in doomed {
        if let Some(mut node) = copy.tree.get_mut(id) {
            node.detach();
        }
    }

    copy.select(&body_selector)
        .next()
        .map(rendered_text)
        .unwrap_or_default()
}

/// Approximates the browser's `innerText`: skips non-rendered elements,
/// collapses inline whitespace, and breaks lines around block elements.
pub fn rendered_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    render_into(element, false, &mut out);
    out
}

fn render_into(element: ElementRef<'_>, in_pre: bool, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_TAGS.contains(&name) {
        return;
    }
    let in_pre = in_pre || name == "pre";
    let is_paragraph = name == "p";
    let is_block = BLOCK_TAGS.contains(&name);

    if is_paragraph {
        out.push_str("\n\n");
    } else if is_block {
        out.push('\n');
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                if in_pre {
                    out.push_str(text);
                } else {
                    push_collapsed(text, out);
                }
            }
            Node::Element(el) if el.name() == "br" => out.push('\n'),
            Node::Element(el) if el.name() == "td" || el.name() == "th" => {
                out.push(' ');
                if let Some(cell) = ElementRef::wrap(child) {
                    render_into(cell, in_pre, out);
                }
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    render_into(child_el, in_pre, out);
                }
            }
            _ => {}
        }
    }

    if is_paragraph {
        out.push_str("\n\n");
    } else if is_block {
        out.push('\n');
    }
}

fn push_collapsed(text: &str, out: &mut String) {
    let mut last_was_space = out.ends_with(|c: char| c == ' ' || c == '\n');
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
}

/// Collapses every whitespace run, line breaks included, to a single space
/// and trims both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// `summer extract`: print what the extractor keeps from a page.
pub async fn run_extract(page: &dyn PageSource, json: bool) -> Result<()> {
    let html = page.load_html().await?;
    let extracted = extract_html(&html);

    if json {
        let obj = serde_json::json!({
            "source": page.describe(),
            "length": extracted.len(),
            "content": extracted.content(),
        });
        println!("{}", serde_json::to_string_pretty(&obj)?);
        return Ok(());
    }

    println!("Source: {}", page.describe());
    println!("Length: {} characters", extracted.len());
    println!();
    if extracted.is_empty() {
        println!("(no readable content found)");
    } else {
        println!("{}", extracted.content());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(prefix: &str, n: usize) -> String {
        (0..n)
            .map(|i| format!("{}{}", prefix, i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn landmark_wins_over_longer_paragraphs() {
        let article = words("story", 60);
        let html = format!(
            "<html><body><article>{}</article><div><p>{}</p><p>{}</p></div></body></html>",
            article,
            words("para", 200),
            words("more", 200)
        );
        let out = extract_html(&html);
        assert_eq!(out.content(), article);
    }

    #[test]
    fn first_landmark_selector_wins_not_longest() {
        let article = words("first", 60);
        let main = words("second", 400);
        let html = format!(
            "<body><main>{}</main><article>{}</article></body>",
            main, article
        );
        // `article` precedes `main` in the selector list.
        assert_eq!(extract_html(&html).content(), article);
    }

    #[test]
    fn short_landmark_falls_through_to_paragraphs() {
        let p1 = "This paragraph is long enough to be kept by the aggregator.";
        let p2 = "A second paragraph that also clears the twenty character bar.";
        let html = format!(
            "<body><article><p>{}</p><p>tiny</p></article><p>{}</p></body>",
            p1, p2
        );
        let out = extract_html(&html);
        assert_eq!(out.content(), format!("{} {}", p1, p2));
        assert!(!out.content().contains("tiny"));
    }

    #[test]
    fn body_fallback_drops_non_content_regions() {
        let html = r#"<html><body>
            <nav>Home About Contact</nav>
            <header>Site Banner</header>
            <div class="sidebar">Related links</div>
            <div class="ads">Buy now</div>
            <div>Short body text that survives.</div>
            <footer>Copyright notice</footer>
        </body></html>"#;
        let out = extract_html(html);
        assert_eq!(out.content(), "Short body text that survives.");
        for noise in ["Home", "Banner", "Related", "Buy now", "Copyright"] {
            assert!(!out.content().contains(noise), "leaked {}", noise);
        }
    }

    #[test]
    fn extraction_does_not_mutate_document() {
        let html = "<body><nav>menu</nav><div>content here</div></body>";
        let document = Html::parse_document(html);
        let before = document.html();
        let first = extract(&document);
        assert_eq!(document.html(), before);
        assert_eq!(extract(&document), first);
    }

    #[test]
    fn empty_document_yields_empty_text() {
        let out = extract_html("<html><head><title>t</title></head><body></body></html>");
        assert!(out.is_empty());
        assert_eq!(out.content(), "");
    }

    #[test]
    fn scripts_and_styles_are_not_rendered() {
        let html = "<body><script>var x = 1;</script><style>p{}</style><div>visible</div></body>";
        assert_eq!(extract_html(html).content(), "visible");
    }

    #[test]
    fn normalize_collapses_all_whitespace_to_one_line() {
        let raw = "  Title \t here\n\n\n\n  body   line one\nline two  \n\n \n end ";
        assert_eq!(
            normalize_whitespace(raw),
            "Title here body line one line two end"
        );
    }

    #[test]
    fn block_elements_become_word_breaks() {
        let document = Html::parse_fragment("<div><h1>Head</h1><p>One</p><p>Two</p>a<br>b</div>");
        let root = document.root_element();
        let text = normalize_whitespace(&rendered_text(root));
        assert_eq!(text, "Head One Two a b");
    }

    #[test]
    fn headings_and_paragraphs_flatten_to_single_line() {
        let out = extract_html(
            "<body><article><h1>Title</h1><p>First paragraph text here.</p>\
             <p>Second paragraph text here.</p></article></body>",
        );
        assert_eq!(
            out.content(),
            "Title First paragraph text here. Second paragraph text here."
        );
        assert_eq!(out.len(), 60);
    }

    #[test]
    fn landmark_of_exactly_200_chars_is_rejected() {
        let html = |n: usize| {
            format!(
                "<body><article>{}</article><div>outside</div></body>",
                "a".repeat(n)
            )
        };
        // Rejected: falls through to the body, which includes the outside div.
        assert_eq!(
            extract_html(&html(200)).content(),
            format!("{} outside", "a".repeat(200))
        );
        assert_eq!(extract_html(&html(201)).content(), "a".repeat(201));
    }

    #[test]
    fn paragraph_of_exactly_20_chars_is_dropped() {
        let long = words("long", 30);
        let html = format!(
            "<body><p>{}</p><p>{}</p><p>{}</p></body>",
            long,
            "q".repeat(20),
            "z".repeat(21)
        );
        let out = extract_html(&html);
        assert_eq!(out.content(), format!("{} {}", long, "z".repeat(21)));
        assert!(!out.content().contains('q'));
    }
}
