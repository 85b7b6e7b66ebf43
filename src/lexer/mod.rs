pub mod token;
pub use token::is_keyword;

use logos::Logos;
use crate::span::{Span, Spanned};
use crate::diagnostics::CompileError;
use token::Token;

/// Tokenize host source. Line comments and plain block comments are dropped;
/// doc comments stay in the stream as `BlockComment(true)`.
pub fn lex(source: &str) -> Result<Vec<Spanned<Token>>, CompileError> {
    lex_tokens(source, false)
}

fn lex_tokens(source: &str, keep_comments: bool) -> Result<Vec<Spanned<Token>>, CompileError> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(Token::LineComment) | Ok(Token::BlockComment(false)) if !keep_comments => continue,
            Ok(tok) => tokens.push(Spanned::new(tok, Span::new(span.start, span.end))),
            Err(()) => {
                let text = &source[span.start..span.end];
                let msg = if text.starts_with("/*") {
                    "unterminated block comment".to_string()
                } else {
                    format!("unexpected character '{text}'")
                };
                return Err(CompileError::syntax(msg, Span::new(span.start, span.end)));
            }
        }
    }

    Ok(tokens)
}

/// Tokenize clause text. Any comment token is an error here.
pub fn lex_clause(text: &str) -> Result<Vec<Spanned<Token>>, CompileError> {
    let tokens = lex_tokens(text, true)?;
    if let Some(comment) = tokens.iter().find(|t| matches!(t.node, Token::BlockComment(_) | Token::LineComment)) {
        return Err(CompileError::syntax("comments are not allowed in clause text", comment.span));
    }
    Ok(tokens)
}
