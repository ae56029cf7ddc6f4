// src/notify/render.rs
//! Plain-text and HTML bodies for a [`Summary`]. Each variant is rendered in exactly
//! one place per sink.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::model::Summary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBody {
    pub plain: String,
    pub html: String,
}

impl RenderedBody {
    pub fn new(summary: &Summary, url: Option<&str>) -> Self {
        Self {
            plain: render_plain(summary, url),
            html: render_html(summary, url),
        }
    }
}

pub fn render_plain(summary: &Summary, url: Option<&str>) -> String {
    let mut out = summary.to_bullet_text();
    if let Some(url) = url {
        out.push_str("\n\nPage link:\n");
        out.push_str(url);
    }
    out
}

pub fn render_html(summary: &Summary, url: Option<&str>) -> String {
    let mut out = match summary {
        Summary::BulletList(items) => {
            let mut s = String::from("<ul>");
            for item in items {
                s.push_str("<li>");
                s.push_str(&encode_text(item));
                s.push_str("</li>");
            }
            s.push_str("</ul>");
            s
        }
        Summary::PlainText(text) => encode_text(text).replace('\n', "<br>"),
    };
    if let Some(url) = url {
        out.push_str(&format!(
            "<br><br><a href=\"{}\" target=\"_blank\">{}</a>",
            encode_double_quoted_attribute(url),
            encode_text(url)
        ));
    }
    out
}
