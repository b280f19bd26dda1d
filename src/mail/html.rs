//! Plain text to minimal HTML for the alternative message part.

/// Convert a plain-text body to HTML.
///
/// Blank lines separate paragraphs, single newlines become `<br>`, and runs
/// of lines starting with `•` become a `<ul>`. Text is entity-escaped.
pub fn text_to_html(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    let mut html = String::new();

    for block in normalized.split("\n\n") {
        let block = block.trim_matches('\n');
        if block.trim().is_empty() {
            continue;
        }

        let mut paragraph: Vec<String> = Vec::new();
        let mut bullets: Vec<String> = Vec::new();

        for line in block.lines() {
            if let Some(item) = line.trim_start().strip_prefix('•') {
                flush_paragraph(&mut html, &mut paragraph);
                bullets.push(escape(item.trim()));
            } else {
                flush_list(&mut html, &mut bullets);
                paragraph.push(escape(line));
            }
        }
        flush_paragraph(&mut html, &mut paragraph);
        flush_list(&mut html, &mut bullets);
    }

    html
}

fn flush_paragraph(html: &mut String, lines: &mut Vec<String>) {
    if lines.is_empty() {
        return;
    }
    html.push_str("<p>");
    html.push_str(&lines.join("<br>"));
    html.push_str("</p>");
    lines.clear();
}

fn flush_list(html: &mut String, items: &mut Vec<String>) {
    if items.is_empty() {
        return;
    }
    html.push_str("<ul>");
    for item in items.iter() {
        html.push_str("<li>");
        html.push_str(item);
        html.push_str("</li>");
    }
    html.push_str("</ul>");
    items.clear();
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
