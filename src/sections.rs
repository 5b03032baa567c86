//! Markdown heading splitter.
//!
//! Reference documents arrive as heading-delimited markdown. [`split_sections`]
//! turns a document body into an ordered list of [`Section`]s, one per heading.
//! Text before the first heading becomes an untitled section, so documents
//! without headings still yield usable content.

/// A titled span of a reference document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Heading text with the `#` markers stripped; empty for preamble text.
    pub title: String,
    /// Body text, end-trimmed, interior blank lines preserved.
    pub body: String,
}

/// Split heading-delimited text into ordered sections.
///
/// A line of one to six `#` characters followed by a space opens a new
/// section. Blank input yields an empty vec; input with no headings yields a
/// single untitled section.
pub fn split_sections(content: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut title = String::new();
    let mut body = String::new();

    for line in content.lines() {
        if let Some(heading) = heading_title(line) {
            flush(&mut sections, &title, &body);
            title = heading.to_string();
            body.clear();
        } else {
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(line);
        }
    }
    flush(&mut sections, &title, &body);

    sections
}

fn flush(sections: &mut Vec<Section>, title: &str, body: &str) {
    let body = body.trim();
    if title.is_empty() && body.is_empty() {
        return;
    }
    sections.push(Section {
        title: title.to_string(),
        body: body.to_string(),
    });
}

/// Heading text of `line`, or `None` when the line is not a markdown heading.
/// Requires a space after the hash run, so `#hashtag` stays body text.
fn heading_title(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    let hashes = trimmed.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = trimmed[hashes..].strip_prefix(' ')?;
    Some(rest.trim())
}
