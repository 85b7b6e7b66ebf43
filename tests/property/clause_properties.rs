// Properties of clause extraction and clause lexing over generated comments.

use proptest::prelude::*;
use specweave::clauses::{extract, ClauseTag};
use specweave::lexer::lex_clause;
use specweave::parser::ast::{DeclId, DocComment};
use specweave::span::Span;

fn doc(text: String) -> DocComment {
    let span = Span::new(0, text.len());
    DocComment { text, span }
}

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9]{0,8}".prop_filter("keyword", |s| {
        !matches!(s.as_str(), "old" | "result" | "this" | "true" | "false" | "null" | "new" | "if" | "int")
    })
}

#[test]
fn prop_extract_never_panics() {
    proptest!(|(body in "[ -~\n]{0,300}")| {
        let _ = extract(&doc(format!("/**{body}*/")), DeclId(0));
    });
}

#[test]
fn prop_segments_map_back_to_source() {
    proptest!(|(body in "[ -~\n]{0,300}")| {
        let text = format!("/**{body}*/");
        for record in extract(&doc(text.clone()), DeclId(0)) {
            for seg in &record.segments {
                let in_source = &text[seg.source_offset..seg.source_offset + seg.len];
                let in_clause = &record.raw_text[seg.text_offset..seg.text_offset + seg.len];
                prop_assert_eq!(in_source, in_clause);
            }
            prop_assert!(record.span.end <= text.len());
            prop_assert!(record.span.start <= record.span.end);
        }
    });
}

#[test]
fn prop_clause_text_is_trimmed() {
    proptest!(|(name in ident(), bound in 0i64..1000, pad in " {0,6}", trail in " {0,6}")| {
        let text = format!("/** @pre |{pad}{name} > {bound}{trail}\n */");
        let records = extract(&doc(text), DeclId(0));
        prop_assert_eq!(records.len(), 1);
        prop_assert_eq!(records[0].tag, ClauseTag::Precondition);
        prop_assert_eq!(records[0].raw_text.clone(), format!("{name} > {bound}"));
    });
}

#[test]
fn prop_continuation_lines_join_with_one_space() {
    proptest!(|(parts in prop::collection::vec(ident(), 1..5))| {
        let mut text = String::from("/**\n * @post | ");
        text.push_str(&parts[0]);
        for part in &parts[1..] {
            text.push_str("\n *   |    ");
            text.push_str(part);
        }
        text.push_str("\n */");
        let records = extract(&doc(text.clone()), DeclId(0));
        prop_assert_eq!(records.len(), 1);
        prop_assert_eq!(records[0].raw_text.clone(), parts.join(" "));
        prop_assert_eq!(records[0].segments.len(), parts.len());

        // Every token of the joined text maps onto the same word in the comment
        let tokens = lex_clause(&records[0].raw_text).unwrap();
        for tok in tokens {
            let mapped = records[0].source_span(tok.span);
            prop_assert_eq!(&text[mapped.start..mapped.end], &records[0].raw_text[tok.span.start..tok.span.end]);
        }
    });
}

#[test]
fn prop_prose_yields_no_clauses() {
    proptest!(|(words in prop::collection::vec("[a-z]{1,10}", 0..20))| {
        let text = format!("/** {} */", words.join(" "));
        prop_assert!(extract(&doc(text), DeclId(0)).is_empty());
    });
}

#[test]
fn prop_clause_lexer_never_panics() {
    proptest!(|(text in "\\PC{0,200}")| {
        let _ = lex_clause(&text);
    });
}
