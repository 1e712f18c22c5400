//! Formatting utilities (embed markdown subset → Telegram HTML).

use std::sync::OnceLock;

use regex::Regex;

use crate::messaging::types::{Embed, MessageBody};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Convert the markdown subset used in embeds to Telegram-compatible HTML.
///
/// Only `**bold**` and `[label](url)` are recognised; single `*`/`_` are left alone
/// because link titles and URLs are full of them.
pub fn convert_markdown_to_html(input: &str) -> String {
    static LINK_RE: OnceLock<Regex> = OnceLock::new();

    let text = escape_html(input);
    let text = text
        .split('\n')
        .map(|line| replace_delimited(line, "**", "<b>", "</b>"))
        .collect::<Vec<_>>()
        .join("\n");

    // Links: [text](url) -> <a href="url">text</a>
    // Labels may carry `\[`/`\]`; urls may carry one level of balanced parentheses.
    let link_re = LINK_RE.get_or_init(|| {
        Regex::new(r"\[((?:\\[\[\]]|[^\[\]])+)\]\(((?:[^()\s]|\([^()\s]*\))+)\)")
            .expect("valid regex")
    });
    link_re
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            let label = caps[1].replace("\\[", "[").replace("\\]", "]");
            format!(r#"<a href="{}">{label}</a>"#, &caps[2])
        })
        .to_string()
}

fn replace_delimited(text: &str, delim: &str, open: &str, close: &str) -> String {
    let mut out = String::new();
    let mut i = 0usize;
    while let Some(rel) = text[i..].find(delim) {
        let start = i + rel;
        out.push_str(&text[i..start]);
        let content_start = start + delim.len();
        if let Some(end_rel) = text[content_start..].find(delim) {
            let end = content_start + end_rel;
            out.push_str(open);
            out.push_str(&text[content_start..end]);
            out.push_str(close);
            i = end + delim.len();
            continue;
        }
        out.push_str(&text[start..]);
        return out;
    }
    out.push_str(&text[i..]);
    out
}

/// Render an embed as a Telegram HTML block.
///
/// Layout: bold author line, description, one bold-titled block per field, then the
/// footer in italics.
pub fn render_embed_html(embed: &Embed) -> String {
    let mut blocks = Vec::new();

    if let Some(author) = &embed.author {
        blocks.push(format!("<b>{}</b>", escape_html(author)));
    }
    if !embed.description.trim().is_empty() {
        blocks.push(convert_markdown_to_html(embed.description.trim()));
    }
    for field in &embed.fields {
        blocks.push(format!(
            "<b>{}</b>\n{}",
            escape_html(&field.name),
            convert_markdown_to_html(&field.value)
        ));
    }
    if let Some(footer) = &embed.footer {
        blocks.push(format!("<i>{}</i>", escape_html(footer)));
    }

    blocks.join("\n\n")
}

/// Render a full message body (content line above the embed).
pub fn render_body_html(body: &MessageBody) -> String {
    let mut parts = Vec::new();
    if let Some(content) = &body.content {
        parts.push(convert_markdown_to_html(content));
    }
    if let Some(embed) = &body.embed {
        parts.push(render_embed_html(embed));
    }
    parts.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html() {
        let s = r#"<a href="x&y">"#;
        assert_eq!(escape_html(s), "&lt;a href=&quot;x&amp;y&quot;&gt;");
    }

    #[test]
    fn converts_links_and_bold() {
        let md = "**Title:** [x](https://example.com/a_b?c=1&d=2)";
        let html = convert_markdown_to_html(md);
        assert_eq!(
            html,
            r#"<b>Title:</b> <a href="https://example.com/a_b?c=1&amp;d=2">x</a>"#
        );
    }

    #[test]
    fn links_keep_parenthesised_urls_and_escaped_brackets() {
        let md = r"[Rust \[wiki\]](https://en.wikipedia.org/wiki/Rust_(programming_language)) tail)";
        assert_eq!(
            convert_markdown_to_html(md),
            r#"<a href="https://en.wikipedia.org/wiki/Rust_(programming_language)">Rust [wiki]</a> tail)"#
        );
    }

    #[test]
    fn leaves_unclosed_bold_alone() {
        assert_eq!(convert_markdown_to_html("**oops"), "**oops");
    }

    #[test]
    fn renders_embed_sections_in_order() {
        let embed = Embed::new("• [B](http://x)")
            .author("Links <all>")
            .field("Categories", "wordpress")
            .footer("Page 1/1");
        let html = render_embed_html(&embed);
        assert_eq!(
            html,
            "<b>Links &lt;all&gt;</b>\n\n• <a href=\"http://x\">B</a>\n\n<b>Categories</b>\nwordpress\n\n<i>Page 1/1</i>"
        );
    }

    #[test]
    fn body_puts_content_above_embed() {
        let body = MessageBody::embed(Embed::new("• A")).with_content("Menu Inactive");
        assert_eq!(render_body_html(&body), "Menu Inactive\n\n• A");
    }
}
