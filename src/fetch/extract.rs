// src/fetch/extract.rs
//! Readable-text extraction from raw or rendered HTML.

use once_cell::sync::Lazy;
use scraper::{node::Node, ElementRef, Html, Selector};

const HEADING_MIN_CHARS: usize = 20;
const TABLE_MIN_CHARS: usize = 50;
const TABLE_MAX_CHARS: usize = 800;
const BOLD_MIN_CHARS: usize = 20;

static ROOT_ARTICLE: Lazy<Selector> = Lazy::new(|| Selector::parse("article").expect("article selector"));
static ROOT_MAIN: Lazy<Selector> = Lazy::new(|| Selector::parse("main").expect("main selector"));
static ROOT_BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("body selector"));
static HEADINGS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("heading selector"));
static TABLES: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("table selector"));
static BOLD: Lazy<Selector> = Lazy::new(|| Selector::parse("b, strong").expect("bold selector"));

/// Main readable text plus a few high-signal fragments pulled from anywhere in the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub main: String,
    pub supplemental: Vec<String>,
}

impl Extracted {
    pub fn main_chars(&self) -> usize {
        self.main.chars().count()
    }

    /// Final page text handed to the pipeline.
    pub fn compose(&self) -> String {
        format!(
            "PRIMARY_CONTENT:\n{}\n\nSUPPLEMENTAL_SNIPPETS:\n{}",
            self.main,
            self.supplemental.join("\n")
        )
    }
}

/// Parse `html` and extract main text + up to `max_supplemental` fragments.
pub fn extract(html: &str, max_supplemental: usize) -> Extracted {
    let document = Html::parse_document(html);
    let root = pick_root(&document);

    let mut blocks = Vec::new();
    walk(root, &mut blocks);

    Extracted {
        main: blocks.join("\n\n"),
        supplemental: supplemental(&document, max_supplemental),
    }
}

fn pick_root(document: &Html) -> ElementRef<'_> {
    document
        .select(&ROOT_ARTICLE)
        .next()
        .or_else(|| document.select(&ROOT_MAIN).next())
        .or_else(|| document.select(&ROOT_BODY).next())
        .unwrap_or_else(|| document.root_element())
}

fn is_skipped(tag: &str) -> bool {
    matches!(
        tag,
        "script"
            | "style"
            | "noscript"
            | "template"
            | "svg"
            | "nav"
            | "header"
            | "footer"
            | "aside"
            | "form"
            | "iframe"
            | "button"
            | "select"
    )
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "li"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "blockquote"
            | "pre"
            | "dt"
            | "dd"
            | "figcaption"
            | "caption"
            | "tr"
    )
}

fn is_inline(tag: &str) -> bool {
    matches!(
        tag,
        "a" | "span"
            | "b"
            | "strong"
            | "em"
            | "i"
            | "u"
            | "small"
            | "code"
            | "abbr"
            | "time"
            | "label"
            | "sup"
            | "sub"
            | "mark"
            | "font"
            | "br"
    )
}

/// Child of a container, sorted by how the walk treats it.
enum Piece<'a> {
    Text(&'a str),
    Inline(ElementRef<'a>),
    Nested(ElementRef<'a>),
}

fn pieces(element: ElementRef<'_>) -> std::vec::IntoIter<Piece<'_>> {
    element
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(t) => Some(Piece::Text(&**t)),
            Node::Element(el) => ElementRef::wrap(child).map(|r| {
                if is_inline(el.name()) {
                    Piece::Inline(r)
                } else {
                    Piece::Nested(r)
                }
            }),
            _ => None,
        })
        .collect::<Vec<_>>()
        .into_iter()
}

/// Collect text blocks under `root`. Loose text and inline children of a container
/// accumulate until the next non-inline child. Iterative, so nesting depth is bounded
/// only by the heap.
fn walk(root: ElementRef<'_>, blocks: &mut Vec<String>) {
    let mut loose = String::new();
    let mut stack = Vec::new();
    enter(root, &mut stack, blocks);

    while let Some(frame) = stack.last_mut() {
        match frame.next() {
            Some(Piece::Text(t)) => loose.push_str(t),
            Some(Piece::Inline(el)) => collect_text(el, &mut loose),
            Some(Piece::Nested(el)) => {
                flush(&mut loose, blocks);
                enter(el, &mut stack, blocks);
            }
            None => {
                flush(&mut loose, blocks);
                stack.pop();
            }
        }
    }
}

/// Emit a skipped or block element right away; open a frame for a container.
fn enter<'a>(
    element: ElementRef<'a>,
    stack: &mut Vec<std::vec::IntoIter<Piece<'a>>>,
    blocks: &mut Vec<String>,
) {
    let tag = element.value().name();
    if is_skipped(tag) {
        return;
    }
    if is_block(tag) {
        let text = if tag == "tr" {
            row_text(element)
        } else {
            visible_text(element)
        };
        if !text.is_empty() {
            blocks.push(text);
        }
        return;
    }
    stack.push(pieces(element));
}

fn flush(loose: &mut String, blocks: &mut Vec<String>) {
    let text = collapse_whitespace(loose);
    if !text.is_empty() {
        blocks.push(text);
    }
    loose.clear();
}

/// Text of an element minus anything inside skipped descendants.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    collapse_whitespace(&raw)
}

enum Step<'a> {
    Open(ElementRef<'a>),
    Text(&'a str),
    Gap,
}

/// Append the text under `element` in document order. Non-inline descendants are
/// padded with a space so adjacent cells or divs never glue together; inline ones are
/// not, so "June <b>1</b>." stays "June 1.".
fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let mut stack = vec![Step::Open(element)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Text(t) => out.push_str(t),
            Step::Gap => out.push(' '),
            Step::Open(el) => {
                let tag = el.value().name();
                if is_skipped(tag) {
                    continue;
                }
                if tag == "br" {
                    out.push(' ');
                    continue;
                }
                let padded = !is_inline(tag);
                if padded {
                    stack.push(Step::Gap);
                }
                push_children(el, &mut stack);
                if padded {
                    stack.push(Step::Gap);
                }
            }
        }
    }
}

// Pushed in reverse so pops come out in document order.
fn push_children<'a>(element: ElementRef<'a>, stack: &mut Vec<Step<'a>>) {
    let start = stack.len();
    for child in element.children() {
        match child.value() {
            Node::Text(t) => stack.push(Step::Text(&**t)),
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    stack.push(Step::Open(el));
                }
            }
            _ => {}
        }
    }
    stack[start..].reverse();
}

fn row_text(row: ElementRef<'_>) -> String {
    row.children()
        .filter_map(ElementRef::wrap)
        .map(visible_text)
        .filter(|cell| !cell.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

fn supplemental(document: &Html, max: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let push = |text: String, out: &mut Vec<String>| {
        if out.len() < max && !out.contains(&text) {
            out.push(text);
        }
    };

    for h in document.select(&HEADINGS) {
        let text = visible_text(h);
        if text.chars().count() > HEADING_MIN_CHARS {
            push(text, &mut out);
        }
    }
    for table in document.select(&TABLES) {
        let text = visible_text(table);
        if text.chars().count() > TABLE_MIN_CHARS {
            push(truncate_chars(&text, TABLE_MAX_CHARS), &mut out);
        }
    }
    for b in document.select(&BOLD) {
        let text = visible_text(b);
        if text.chars().count() > BOLD_MIN_CHARS {
            push(text, &mut out);
        }
    }
    out
}

pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn collapse_whitespace(input: &str) -> String {
    let mut buf = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space && !buf.is_empty() {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    buf.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><title>t</title><style>.x{}</style></head>
        <body>
          <nav><a href="/">Home</a> <a href="/about">About</a></nav>
          <main>
            <h2>Admissions Schedule for Fall Semester</h2>
            <p>Applications   close on <b>June 1</b>.</p>
            <ul><li>Fee: 5000</li><li>Merit list on July 10</li></ul>
            <table>
              <tr><th>Program</th><th>Deadline</th></tr>
              <tr><td>Computer Science</td><td>June 1, 2025 at 5pm local time</td></tr>
            </table>
            <p><strong>Late applications will not be accepted</strong></p>
            <script>var tracking = 1;</script>
          </main>
          <footer>Copyright 2025</footer>
        </body></html>
    "#;

    #[test]
    fn main_text_comes_from_main_and_skips_chrome() {
        let ex = extract(PAGE, 10);
        assert!(ex.main.contains("Admissions Schedule for Fall Semester"));
        assert!(ex.main.contains("Applications close on June 1."));
        assert!(ex.main.contains("Fee: 5000"));
        assert!(ex.main.contains("Computer Science | June 1, 2025 at 5pm local time"));
        assert!(!ex.main.contains("tracking"));
        assert!(!ex.main.contains("Copyright"));
        assert!(!ex.main.contains("About"));
    }

    #[test]
    fn supplemental_picks_long_headings_tables_and_bold() {
        let ex = extract(PAGE, 10);
        assert_eq!(ex.supplemental[0], "Admissions Schedule for Fall Semester");
        assert!(ex.supplemental[1].starts_with("Program Deadline"));
        assert!(ex
            .supplemental
            .contains(&"Late applications will not be accepted".to_string()));
        // "June 1" is bold but too short
        assert!(!ex.supplemental.iter().any(|s| s == "June 1"));
    }

    #[test]
    fn supplemental_is_capped_and_tables_truncated() {
        let mut html = String::from("<body>");
        for i in 0..15 {
            html.push_str(&format!("<h3>Important announcement number {i:02}</h3>"));
        }
        html.push_str("</body>");
        let ex = extract(&html, 10);
        assert_eq!(ex.supplemental.len(), 10);

        let long_cell = "x".repeat(2000);
        let table = format!("<body><table><tr><td>{long_cell}</td></tr></table></body>");
        let ex = extract(&table, 10);
        assert_eq!(ex.supplemental[0].chars().count(), 800);
    }

    #[test]
    fn inline_markup_does_not_add_spaces() {
        let ex = extract(
            "<body><p>Fee is <b>5000</b>, due <a href=\"/d\">June 1</a>.</p><div>Apply <em>now</em>!<br>Office hours</div></body>",
            10,
        );
        assert_eq!(ex.main, "Fee is 5000, due June 1.\n\nApply now! Office hours");
    }

    #[test]
    fn deeply_nested_document_is_extracted() {
        let depth = 20_000;
        let mut html = String::from("<body>");
        html.push_str(&"<div>".repeat(depth));
        html.push_str("<p>Merit list published for the fall intake</p><span>see notice</span>");
        html.push_str(&"</div>".repeat(depth));
        html.push_str("</body>");

        // Run on a small stack so a per-level recursion would overflow.
        let ex = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || extract(&html, 10))
            .unwrap()
            .join()
            .expect("extraction finishes");
        assert_eq!(ex.main, "Merit list published for the fall intake\n\nsee notice");
    }

    #[test]
    fn compose_uses_section_markers() {
        let ex = Extracted {
            main: "body".into(),
            supplemental: vec!["one".into(), "two".into()],
        };
        assert_eq!(
            ex.compose(),
            "PRIMARY_CONTENT:\nbody\n\nSUPPLEMENTAL_SNIPPETS:\none\ntwo"
        );
    }
}
