//! Line-oriented markdown subset used by diagnostic replies
//!
//! Supports: `#`/`##`/`###` headings, `-`/`*`/`•` bullets, `1.` numbered
//! items, whole-line `**bold**` section headers, and inline `**bold**`,
//! `*italic*`, `` `code` ``. Lines are classified one at a time and spans
//! never nest.

use std::sync::OnceLock;

use regex::{Match, Regex};

/// Inline fragment within one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineSpan {
    PlainText(String),
    Bold(Vec<InlineSpan>),
    Italic(Vec<InlineSpan>),
    Code(String),
}

impl InlineSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        InlineSpan::PlainText(text.into())
    }

    pub fn bold(text: impl Into<String>) -> Self {
        InlineSpan::Bold(vec![InlineSpan::plain(text)])
    }

    pub fn italic(text: impl Into<String>) -> Self {
        InlineSpan::Italic(vec![InlineSpan::plain(text)])
    }

    pub fn code(text: impl Into<String>) -> Self {
        InlineSpan::Code(text.into())
    }

    /// Text content with markup removed
    pub fn text(&self) -> String {
        match self {
            InlineSpan::PlainText(s) | InlineSpan::Code(s) => s.clone(),
            InlineSpan::Bold(children) | InlineSpan::Italic(children) => spans_text(children),
        }
    }
}

/// Concatenated text of a span sequence
pub fn spans_text(spans: &[InlineSpan]) -> String {
    spans.iter().map(InlineSpan::text).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Ordered,
    Unordered,
}

/// Line-level structural unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentNode {
    /// Level is 1..=3
    Heading { level: u8, spans: Vec<InlineSpan> },
    /// A line that is bold from end to end, used as a section header
    BoldBlock(Vec<InlineSpan>),
    Paragraph(Vec<InlineSpan>),
    ListItem { kind: ListKind, spans: Vec<InlineSpan> },
    LineBreak,
}

impl DocumentNode {
    pub fn spans(&self) -> &[InlineSpan] {
        match self {
            DocumentNode::Heading { spans, .. }
            | DocumentNode::BoldBlock(spans)
            | DocumentNode::Paragraph(spans)
            | DocumentNode::ListItem { spans, .. } => spans,
            DocumentNode::LineBreak => &[],
        }
    }
}

// Longest first so "### " is not read as "# ".
const HEADING_MARKERS: [(&str, u8); 3] = [("### ", 3), ("## ", 2), ("# ", 1)];
const BULLET_MARKERS: [&str; 3] = ["- ", "* ", "• "];
const BOLD: &str = "**";

static TOKENIZER: OnceLock<MarkdownTokenizer> = OnceLock::new();

/// Tokenize cleaned reply text into block nodes, one per line
pub fn tokenize(text: &str) -> Vec<DocumentNode> {
    TOKENIZER.get_or_init(MarkdownTokenizer::new).tokenize(text)
}

/// Tokenize the content of one line into inline spans
pub fn tokenize_inline(text: &str) -> Vec<InlineSpan> {
    TOKENIZER.get_or_init(MarkdownTokenizer::new).tokenize_inline(text)
}

/// Pair each node with its number when it is an ordered list item.
///
/// Numbering counts 1.. within a run of ordered items. Blank lines do not
/// end a run; any other node does.
pub fn list_numbers(nodes: &[DocumentNode]) -> impl Iterator<Item = (&DocumentNode, Option<usize>)> + '_ {
    nodes.iter().scan(0usize, |run, node| {
        let number = match node {
            DocumentNode::ListItem {
                kind: ListKind::Ordered,
                ..
            } => {
                *run += 1;
                Some(*run)
            }
            DocumentNode::LineBreak => None,
            _ => {
                *run = 0;
                None
            }
        };
        Some((node, number))
    })
}

/// Compiled inline patterns.
///
/// Spans never nest: the leftmost match wins, ties go to bold, then code,
/// then italic. Markers without a closer, or with nothing between opener and
/// closer, stay literal.
pub struct MarkdownTokenizer {
    bold: Regex,
    code: Regex,
    italic: Regex,
}

impl MarkdownTokenizer {
    pub fn new() -> Self {
        Self {
            bold: Regex::new(r"\*\*(.+?)\*\*").unwrap(),
            code: Regex::new(r"`([^`]+)`").unwrap(),
            italic: Regex::new(r"\*([^*]+)\*").unwrap(),
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<DocumentNode> {
        text.lines().map(|line| self.classify_line(line)).collect()
    }

    fn classify_line(&self, line: &str) -> DocumentNode {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return DocumentNode::LineBreak;
        }

        for (marker, level) in HEADING_MARKERS {
            if let Some(rest) = trimmed.strip_prefix(marker) {
                return DocumentNode::Heading {
                    level,
                    spans: self.tokenize_inline(rest.trim()),
                };
            }
        }

        for marker in BULLET_MARKERS {
            if let Some(rest) = trimmed.strip_prefix(marker) {
                return DocumentNode::ListItem {
                    kind: ListKind::Unordered,
                    spans: self.tokenize_inline(rest.trim()),
                };
            }
        }

        if let Some(rest) = strip_ordered_marker(trimmed) {
            return DocumentNode::ListItem {
                kind: ListKind::Ordered,
                spans: self.tokenize_inline(rest.trim()),
            };
        }

        if let Some(inner) = whole_line_bold(trimmed) {
            return DocumentNode::BoldBlock(self.tokenize_inline(inner));
        }

        DocumentNode::Paragraph(self.tokenize_inline(trimmed))
    }

    pub fn tokenize_inline(&self, text: &str) -> Vec<InlineSpan> {
        let mut spans = Vec::new();
        let mut rest = text;

        while let Some((start, end, span)) = self.first_match(rest) {
            if start > 0 {
                spans.push(InlineSpan::plain(&rest[..start]));
            }
            spans.push(span);
            rest = &rest[end..];
        }

        if !rest.is_empty() {
            spans.push(InlineSpan::plain(rest));
        }
        spans
    }

    fn first_match(&self, text: &str) -> Option<(usize, usize, InlineSpan)> {
        let candidates = [
            self.bold
                .captures(text)
                .and_then(|c| c.get(0).map(|m| (m, InlineSpan::bold(&c[1])))),
            self.code
                .captures(text)
                .and_then(|c| c.get(0).map(|m| (m, InlineSpan::code(&c[1])))),
            self.italic_match(text),
        ];

        let mut best: Option<(usize, usize, InlineSpan)> = None;
        for (whole, span) in candidates.into_iter().flatten() {
            if best.as_ref().map_or(true, |(start, _, _)| whole.start() < *start) {
                best = Some((whole.start(), whole.end(), span));
            }
        }
        best
    }

    /// First `*italic*` whose markers do not touch another `*`
    fn italic_match<'t>(&self, text: &'t str) -> Option<(Match<'t>, InlineSpan)> {
        let mut from = 0;
        while let Some(caps) = self.italic.captures_at(text, from) {
            let whole = caps.get(0)?;
            let touches_double = text[..whole.start()].ends_with('*') || text[whole.end()..].starts_with('*');
            if !touches_double {
                return Some((whole, InlineSpan::italic(&caps[1])));
            }
            from = whole.start() + 1;
        }
        None
    }
}

impl Default for MarkdownTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip `<digits>. ` and return the rest of the line
fn strip_ordered_marker(line: &str) -> Option<&str> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    line[digits..].strip_prefix(". ")
}

fn whole_line_bold(line: &str) -> Option<&str> {
    let inner = line.strip_prefix(BOLD)?.strip_suffix(BOLD)?;
    if inner.trim().is_empty() || inner.contains(BOLD) {
        return None;
    }
    Some(inner.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unordered(text: &str) -> DocumentNode {
        DocumentNode::ListItem {
            kind: ListKind::Unordered,
            spans: vec![InlineSpan::plain(text)],
        }
    }

    #[test]
    fn test_block_classification_order() {
        let nodes = tokenize("**Section**\n- item one\n- item two\n1. first\nplain text");
        assert_eq!(
            nodes,
            vec![
                DocumentNode::BoldBlock(vec![InlineSpan::plain("Section")]),
                unordered("item one"),
                unordered("item two"),
                DocumentNode::ListItem {
                    kind: ListKind::Ordered,
                    spans: vec![InlineSpan::plain("first")],
                },
                DocumentNode::Paragraph(vec![InlineSpan::plain("plain text")]),
            ]
        );
    }

    #[test]
    fn test_inline_spans_in_paragraph() {
        let nodes = tokenize("Use `ls -la` to **list** files");
        assert_eq!(
            nodes,
            vec![DocumentNode::Paragraph(vec![
                InlineSpan::plain("Use "),
                InlineSpan::code("ls -la"),
                InlineSpan::plain(" to "),
                InlineSpan::bold("list"),
                InlineSpan::plain(" files"),
            ])]
        );
    }

    #[test]
    fn test_heading_levels() {
        let nodes = tokenize("# One\n## Two\n### Three\n#### Four\n#nospace");
        assert_eq!(
            nodes,
            vec![
                DocumentNode::Heading { level: 1, spans: vec![InlineSpan::plain("One")] },
                DocumentNode::Heading { level: 2, spans: vec![InlineSpan::plain("Two")] },
                DocumentNode::Heading { level: 3, spans: vec![InlineSpan::plain("Three")] },
                DocumentNode::Paragraph(vec![InlineSpan::plain("#### Four")]),
                DocumentNode::Paragraph(vec![InlineSpan::plain("#nospace")]),
            ]
        );
    }

    #[test]
    fn test_blank_lines_become_breaks() {
        let nodes = tokenize("a\n\n   \r\nb");
        assert_eq!(
            nodes,
            vec![
                DocumentNode::Paragraph(vec![InlineSpan::plain("a")]),
                DocumentNode::LineBreak,
                DocumentNode::LineBreak,
                DocumentNode::Paragraph(vec![InlineSpan::plain("b")]),
            ]
        );
    }

    #[test]
    fn test_bullet_variants() {
        let nodes = tokenize("*   padded star\n  - indented dash\n• dot");
        assert_eq!(
            nodes,
            vec![unordered("padded star"), unordered("indented dash"), unordered("dot")]
        );
    }

    #[test]
    fn test_ordered_marker_ignores_number() {
        let nodes = tokenize("42. answer\n3.no space\n.5 nothing");
        assert_eq!(
            nodes,
            vec![
                DocumentNode::ListItem {
                    kind: ListKind::Ordered,
                    spans: vec![InlineSpan::plain("answer")],
                },
                DocumentNode::Paragraph(vec![InlineSpan::plain("3.no space")]),
                DocumentNode::Paragraph(vec![InlineSpan::plain(".5 nothing")]),
            ]
        );
    }

    #[test]
    fn test_bold_line_with_inner_bold_is_a_paragraph() {
        let nodes = tokenize("**CPU** is hot, check the **fan**");
        assert_eq!(
            nodes,
            vec![DocumentNode::Paragraph(vec![
                InlineSpan::bold("CPU"),
                InlineSpan::plain(" is hot, check the "),
                InlineSpan::bold("fan"),
            ])]
        );
    }

    #[test]
    fn test_italic_and_unmatched_markers() {
        assert_eq!(
            tokenize_inline("an *italic* word"),
            vec![
                InlineSpan::plain("an "),
                InlineSpan::italic("italic"),
                InlineSpan::plain(" word"),
            ]
        );
        assert_eq!(
            tokenize_inline("2 * 3 = 6 and `tick"),
            vec![InlineSpan::plain("2 * 3 = 6 and `tick")]
        );
        assert_eq!(tokenize_inline("**open only"), vec![InlineSpan::plain("**open only")]);
        assert_eq!(tokenize_inline("empty `` code"), vec![InlineSpan::plain("empty `` code")]);
    }

    #[test]
    fn test_italic_closer_may_not_touch_double_marker() {
        assert_eq!(
            tokenize_inline("*a **b**"),
            vec![InlineSpan::plain("*a "), InlineSpan::bold("b")]
        );
    }

    #[test]
    fn test_spans_do_not_nest() {
        assert_eq!(
            tokenize_inline("**run `sfc` now**"),
            vec![InlineSpan::bold("run `sfc` now")]
        );
    }

    #[test]
    fn test_multibyte_text_around_markers() {
        assert_eq!(
            tokenize_inline("温度 **过高** — `nvidia-smi`"),
            vec![
                InlineSpan::plain("温度 "),
                InlineSpan::bold("过高"),
                InlineSpan::plain(" — "),
                InlineSpan::code("nvidia-smi"),
            ]
        );
    }

    #[test]
    fn test_list_numbers_continue_across_blank_lines() {
        let nodes = tokenize("1. a\n\n2. b\n\n3. c\n- d\n9. e");
        let numbers: Vec<Option<usize>> = list_numbers(&nodes).map(|(_, n)| n).collect();
        assert_eq!(
            numbers,
            vec![Some(1), None, Some(2), None, Some(3), None, Some(1)]
        );
    }

    #[test]
    fn test_list_numbers_restart_after_paragraph() {
        let nodes = tokenize("### Fix\n5. a\n5. b\nThen:\n5. c");
        let numbers: Vec<Option<usize>> = list_numbers(&nodes).map(|(_, n)| n).collect();
        assert_eq!(numbers, vec![None, Some(1), Some(2), None, Some(1)]);
    }

    #[test]
    fn test_leftmost_span_wins() {
        assert_eq!(
            tokenize_inline("*why* then `code` then **bold**"),
            vec![
                InlineSpan::italic("why"),
                InlineSpan::plain(" then "),
                InlineSpan::code("code"),
                InlineSpan::plain(" then "),
                InlineSpan::bold("bold"),
            ]
        );
    }

    #[test]
    fn test_tokenize_is_deterministic() {
        let text = "### Steps\n1. Open *Device Manager*\n2. Run `dxdiag`";
        assert_eq!(tokenize(text), tokenize(text));
    }
}
