//! Markdown rendering for blog content.
//!
//! A small, fixed dialect: `#`/`##`/`###` headers, `***`/`**`/`*` emphasis, fenced and
//! inline code, links, images, blockquotes, `-` and `1.` lists, `---` rules and
//! one-paragraph-per-line text.
//!
//! Rendering runs in two passes. [`scan`] splits the document into blocks, collecting
//! fenced code verbatim so inline rules never see it. The writer then renders inline
//! markup inside each non-code block and groups consecutive list items into one list
//! per kind.
//!
//! [`render`] trusts its input: text outside code is emitted as-is, so raw HTML written by
//! the admin survives. Anything written by third parties goes through [`render_untrusted`].

/// Block-level HTML a line may start with and still be passed through unwrapped.
const RAW_BLOCK_TAGS: &[&str] = &[
    "div", "figure", "iframe", "table", "section", "video", "details", "aside", "picture",
    "center", "p", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "blockquote", "hr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

#[derive(Debug, PartialEq, Eq)]
enum Block<'a> {
    Heading { level: u8, text: &'a str },
    Code { lang: Option<&'a str>, body: String },
    Quote(&'a str),
    Item { kind: ListKind, number: u64, text: &'a str },
    Rule,
    Html(&'a str),
    Paragraph(&'a str),
}

/// Renders trusted (admin-authored) Markdown to HTML. Total and deterministic.
pub fn render(markdown: &str) -> String {
    write_blocks(&scan(markdown))
}

/// Renders Markdown from an untrusted source, then strips anything unsafe
/// (scripts, event handlers, `javascript:` URLs).
pub fn render_untrusted(markdown: &str) -> String {
    ammonia::clean(&render(markdown))
}

/// Pass 1: line-oriented block scan.
///
/// A fence that is never closed swallows the rest of the document as code.
fn scan(markdown: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut fence: Option<(Option<&str>, Vec<&str>)> = None;

    for line in markdown.lines() {
        if let Some((lang, body)) = fence.as_mut() {
            if is_fence(line) {
                blocks.push(Block::Code {
                    lang: *lang,
                    body: body.join("\n"),
                });
                fence = None;
            } else {
                body.push(line);
            }
            continue;
        }

        if is_fence(line) {
            fence = Some((fence_lang(line), Vec::new()));
            continue;
        }

        if let Some(block) = scan_line(line) {
            blocks.push(block);
        }
    }

    if let Some((lang, body)) = fence {
        blocks.push(Block::Code {
            lang,
            body: body.join("\n"),
        });
    }

    blocks
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// The info string after an opening fence, when it is a usable class name.
fn fence_lang(line: &str) -> Option<&str> {
    let info = line.trim_start().trim_start_matches('`').trim();
    let usable = !info.is_empty() && !info.contains('`') && !info.contains(char::is_whitespace);
    usable.then_some(info)
}

fn scan_line(line: &str) -> Option<Block<'_>> {
    if line.trim().is_empty() {
        return None;
    }

    // Longest prefix first.
    for (prefix, level) in [("### ", 3), ("## ", 2), ("# ", 1)] {
        if let Some(text) = line.strip_prefix(prefix) {
            let text = text.trim();
            // `# ` alone is dropped like a blank line.
            return (!text.is_empty()).then_some(Block::Heading { level, text });
        }
    }

    if line == "---" {
        return Some(Block::Rule);
    }
    if let Some(text) = line.strip_prefix("> ") {
        let text = text.trim();
        return (!text.is_empty()).then_some(Block::Quote(text));
    }
    if let Some(text) = line.strip_prefix("- ") {
        return Some(Block::Item {
            kind: ListKind::Unordered,
            number: 1,
            text: text.trim(),
        });
    }
    if let Some((number, text)) = ordered_item(line) {
        return Some(Block::Item {
            kind: ListKind::Ordered,
            number,
            text: text.trim(),
        });
    }
    if is_raw_block_html(line) {
        return Some(Block::Html(line));
    }

    Some(Block::Paragraph(line.trim()))
}

/// `<digits>. rest`
fn ordered_item(line: &str) -> Option<(u64, &str)> {
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    let text = line[digits..].strip_prefix(". ")?;
    // Absurdly long numbers still form a list; they just lose their start attribute.
    let number = line[..digits].parse().unwrap_or(1);
    Some((number, text))
}

fn is_raw_block_html(line: &str) -> bool {
    let Some(rest) = line.strip_prefix('<') else {
        return false;
    };
    let name_len = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let name = rest[..name_len].to_ascii_lowercase();
    RAW_BLOCK_TAGS.contains(&name.as_str())
}

/// Pass 2: emit blocks, rendering inline markup and grouping list items.
fn write_blocks(blocks: &[Block<'_>]) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(blocks.len());
    let mut open_list: Option<(ListKind, Vec<String>, u64)> = None;

    for block in blocks {
        let html = match block {
            Block::Item { kind, number, text } => {
                let item = format!("<li>{}</li>", inline(text));
                match open_list.as_mut() {
                    Some((open, items, _)) if *open == *kind => items.push(item),
                    _ => {
                        if let Some(list) = open_list.replace((*kind, vec![item], *number)) {
                            parts.push(close_list(list));
                        }
                    }
                }
                continue;
            }
            Block::Heading { level, text } => format!("<h{level}>{}</h{level}>", inline(text)),
            Block::Code { lang: Some(lang), body } => format!(
                "<pre><code class=\"language-{}\">{}</code></pre>",
                escape_attr(lang),
                escape_code(body)
            ),
            Block::Code { lang: None, body } => {
                format!("<pre><code>{}</code></pre>", escape_code(body))
            }
            Block::Quote(text) => format!("<blockquote>{}</blockquote>", inline(text)),
            Block::Rule => "<hr />".to_string(),
            Block::Html(raw) => raw.to_string(),
            Block::Paragraph(text) => format!("<p>{}</p>", inline(text)),
        };

        if let Some(list) = open_list.take() {
            parts.push(close_list(list));
        }
        parts.push(html);
    }

    if let Some(list) = open_list.take() {
        parts.push(close_list(list));
    }

    parts.join("\n")
}

fn close_list((kind, items, start): (ListKind, Vec<String>, u64)) -> String {
    let body = items.join("");
    match kind {
        ListKind::Unordered => format!("<ul>{body}</ul>"),
        ListKind::Ordered if start != 1 => format!("<ol start=\"{start}\">{body}</ol>"),
        ListKind::Ordered => format!("<ol>{body}</ol>"),
    }
}

/// Renders inline markup within one block's text.
fn inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    push_inline(text, &mut out);
    out
}

fn push_inline(text: &str, out: &mut String) {
    let mut rest = text;

    while let Some(idx) = rest.find(&['`', '*', '[', '!'][..]) {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];

        match span(tail, out) {
            Some(consumed) => rest = &tail[consumed..],
            None => {
                // Special characters are all ASCII, so one byte is one char here.
                out.push_str(&tail[..1]);
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
}

/// Tries to render one inline construct at the start of `tail`. Returns the number of
/// bytes consumed, or `None` when the marker is literal text.
fn span(tail: &str, out: &mut String) -> Option<usize> {
    if let Some(after) = tail.strip_prefix('`') {
        let end = after.find('`').filter(|&end| end > 0)?;
        out.push_str("<code>");
        out.push_str(&escape_code(&after[..end]));
        out.push_str("</code>");
        return Some(end + 2);
    }

    if let Some(after) = tail.strip_prefix('!') {
        let (alt, url, consumed) = bracketed(after)?;
        out.push_str(&format!(
            "<img src=\"{}\" alt=\"{}\" />",
            escape_attr(url),
            escape_attr(alt)
        ));
        return Some(consumed + 1);
    }

    if tail.starts_with('[') {
        let (label, url, consumed) = bracketed(tail)?;
        out.push_str(&format!(
            "<a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">",
            escape_attr(url)
        ));
        push_inline(label, out);
        out.push_str("</a>");
        return Some(consumed);
    }

    emphasis(tail, out)
}

/// `[label](url)` at the start of `tail`: `(label, url, bytes consumed)`.
fn bracketed(tail: &str) -> Option<(&str, &str, usize)> {
    let inner = tail.strip_prefix('[')?;
    let close = inner.find(']').filter(|&close| close > 0)?;
    let after = inner[close + 1..].strip_prefix('(')?;
    let url_end = after.find(')').filter(|&end| end > 0)?;

    let consumed = 1 + close + 2 + url_end + 1;
    Some((&inner[..close], after[..url_end].trim(), consumed))
}

/// `***bold italic***`, `**bold**`, `*italic*`, longest marker first.
fn emphasis(tail: &str, out: &mut String) -> Option<usize> {
    const MARKERS: [(&str, &str, &str); 3] = [
        ("***", "<strong><em>", "</em></strong>"),
        ("**", "<strong>", "</strong>"),
        ("*", "<em>", "</em>"),
    ];

    for (marker, open, close) in MARKERS {
        let Some(inner) = tail.strip_prefix(marker) else {
            continue;
        };
        let Some(end) = closing(inner, marker) else {
            continue;
        };

        out.push_str(open);
        push_inline(&inner[..end], out);
        out.push_str(close);
        return Some(marker.len() * 2 + end);
    }

    None
}

/// Position of the marker closing a span opened with `marker`.
///
/// Code spans and links/images are stepped over whole, so a `*` inside backticks or a URL
/// never closes anything. A lone `*` also skips `**` pairs so `*a **b** c*` nests instead
/// of closing early.
fn closing(inner: &str, marker: &str) -> Option<usize> {
    let bytes = inner.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'`' => {
                if let Some(end) = inner[i + 1..].find('`').filter(|&end| end > 0) {
                    i += end + 2;
                    continue;
                }
            }
            b'[' => {
                if let Some((_, _, consumed)) = bracketed(&inner[i..]) {
                    i += consumed;
                    continue;
                }
            }
            b'*' if inner[i..].starts_with(marker) => {
                if marker == "*" && bytes.get(i + 1) == Some(&b'*') {
                    i += 2;
                    continue;
                }
                return (i > 0).then_some(i);
            }
            _ => {}
        }
        i += 1;
    }

    None
}

fn escape_code(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
