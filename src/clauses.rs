//! Specification clauses embedded in documentation comments.
//!
//! A clause starts at a tag line (`@pre`, `@post`, ...). Expression text
//! follows a `|`, either on the tag line or on continuation lines:
//!
//! ```text
//! /**
//!  * @throws IllegalArgumentException if the amount is negative
//!  *    | amount < 0
//!  * @post | getBalance() == old(getBalance()) + amount
//!  */
//! ```

use serde::Serialize;

use crate::parser::ast::{CompilationUnit, DeclId, DocComment};
use crate::span::{Span, Spanned};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClauseTag {
    Precondition,
    Postcondition,
    Invariant,
    Throws,
    MayThrow,
    Inspects,
    Mutates,
    MutatesProperties,
}

impl ClauseTag {
    pub fn from_tag(tag: &str) -> Option<ClauseTag> {
        match tag {
            "@pre" => Some(ClauseTag::Precondition),
            "@post" => Some(ClauseTag::Postcondition),
            "@invar" | "@invariant" => Some(ClauseTag::Invariant),
            "@throws" => Some(ClauseTag::Throws),
            "@may_throw" => Some(ClauseTag::MayThrow),
            "@inspects" => Some(ClauseTag::Inspects),
            "@mutates" => Some(ClauseTag::Mutates),
            "@mutates_properties" => Some(ClauseTag::MutatesProperties),
            _ => None,
        }
    }

    pub fn is_effect(self) -> bool {
        matches!(self, ClauseTag::Inspects | ClauseTag::Mutates | ClauseTag::MutatesProperties)
    }

    pub fn has_subject(self) -> bool {
        matches!(self, ClauseTag::Throws | ClauseTag::MayThrow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClauseTag::Precondition => "@pre",
            ClauseTag::Postcondition => "@post",
            ClauseTag::Invariant => "@invar",
            ClauseTag::Throws => "@throws",
            ClauseTag::MayThrow => "@may_throw",
            ClauseTag::Inspects => "@inspects",
            ClauseTag::Mutates => "@mutates",
            ClauseTag::MutatesProperties => "@mutates_properties",
        }
    }
}

impl std::fmt::Display for ClauseTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run of `raw_text` copied verbatim from the comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text_offset: usize,
    pub source_offset: usize,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClauseRecord {
    pub tag: ClauseTag,
    pub owner: DeclId,
    /// Expression text, continuation lines joined by a single space.
    pub raw_text: String,
    /// Exception type of a `@throws` / `@may_throw` clause.
    pub subject: Option<Spanned<String>>,
    /// From the tag to the end of the last expression segment.
    pub span: Span,
    pub segments: Vec<Segment>,
}

impl ClauseRecord {
    /// Map a byte offset of `raw_text` back into the source.
    pub fn source_offset(&self, local: usize) -> usize {
        let seg = self
            .segments
            .iter()
            .rev()
            .find(|s| s.text_offset <= local)
            .or(self.segments.first());
        match seg {
            Some(s) => s.source_offset + local.saturating_sub(s.text_offset).min(s.len),
            None => self.span.start,
        }
    }

    /// Map a `raw_text` span back into the source.
    pub fn source_span(&self, local: Span) -> Span {
        let start = self.source_offset(local.start);
        // An end offset on a segment boundary belongs to the earlier segment
        let end = match self.segments.iter().rev().find(|s| s.text_offset < local.end) {
            Some(s) => s.source_offset + (local.end - s.text_offset).min(s.len),
            None => start,
        };
        Span::new(start, end.max(start))
    }
}

struct OpenClause {
    tag: ClauseTag,
    subject: Option<Spanned<String>>,
    start: usize,
    end: usize,
    raw_text: String,
    segments: Vec<Segment>,
}

impl OpenClause {
    fn push_segment(&mut self, text: &str, source_offset: usize) {
        let trimmed_start = text.len() - text.trim_start().len();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        if !self.raw_text.is_empty() {
            self.raw_text.push(' ');
        }
        let source_offset = source_offset + trimmed_start;
        self.segments.push(Segment { text_offset: self.raw_text.len(), source_offset, len: trimmed.len() });
        self.raw_text.push_str(trimmed);
        self.end = source_offset + trimmed.len();
    }

    fn finish(self, owner: DeclId, out: &mut Vec<ClauseRecord>) {
        if self.raw_text.is_empty() {
            return;
        }
        out.push(ClauseRecord {
            tag: self.tag,
            owner,
            raw_text: self.raw_text,
            subject: self.subject,
            span: Span::new(self.start, self.end),
            segments: self.segments,
        });
    }
}

/// Extract the clauses of one documentation comment. Never fails: text that
/// is not a clause is prose, and malformed clauses are left to the parser.
pub fn extract(doc: &DocComment, owner: DeclId) -> Vec<ClauseRecord> {
    let text = doc.text.as_str();
    let body_start = if text.starts_with("/**") { 3 } else { 0 };
    let body_end = if text.len() >= body_start + 2 && text.ends_with("*/") { text.len() - 2 } else { text.len() };
    let body = &text[body_start..body_end];
    let base = doc.span.start + body_start;

    let mut records = Vec::new();
    let mut open: Option<OpenClause> = None;
    let mut line_start = 0;

    for line in body.split('\n') {
        let line_offset = base + line_start;
        line_start += line.len() + 1;

        // Strip leading whitespace and one leading `*`
        let mut col = line.len() - line.trim_start().len();
        if line[col..].starts_with('*') {
            col += 1;
        }
        let rest = &line[col..];
        let lead = rest.len() - rest.trim_start().len();
        col += lead;
        let content = &line[col..];

        if content.starts_with('@') {
            if let Some(done) = open.take() {
                done.finish(owner, &mut records);
            }
            let word_len = content
                .find(|c: char| c.is_whitespace() || c == '|')
                .unwrap_or(content.len());
            let Some(tag) = ClauseTag::from_tag(&content[..word_len]) else {
                continue;
            };

            let mut clause = OpenClause {
                tag,
                subject: None,
                start: line_offset + col,
                end: line_offset + col + word_len,
                raw_text: String::new(),
                segments: Vec::new(),
            };

            let mut pos = col + word_len;
            if tag.has_subject() {
                let after = &line[pos..];
                let skip = after.len() - after.trim_start().len();
                let word = &after[skip..];
                let len = word.find(|c: char| c.is_whitespace() || c == '|').unwrap_or(word.len());
                if len > 0 {
                    let start = line_offset + pos + skip;
                    clause.subject = Some(Spanned::new(word[..len].to_string(), Span::new(start, start + len)));
                    clause.end = start + len;
                }
                pos += skip + len;
            }

            if let Some(bar) = line[pos..].find('|') {
                let seg_start = pos + bar + 1;
                clause.push_segment(&line[seg_start..], line_offset + seg_start);
            }
            open = Some(clause);
        } else if content.starts_with('|') {
            if let Some(clause) = open.as_mut() {
                clause.push_segment(&content[1..], line_offset + col + 1);
            }
        }
    }

    if let Some(done) = open.take() {
        done.finish(owner, &mut records);
    }
    records
}

/// All clauses of a compilation unit, in source order.
pub fn extract_unit(unit: &CompilationUnit) -> Vec<ClauseRecord> {
    let mut records = Vec::new();
    for ty in &unit.types {
        if let Some(doc) = &ty.node.doc {
            records.extend(extract(doc, ty.node.id));
        }
        for member in &ty.node.members {
            if let Some(doc) = member.doc() {
                records.extend(extract(doc, member.id()));
            }
        }
    }
    tracing::debug!(count = records.len(), "extracted clauses");
    records
}
