use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    // Keywords
    #[token("class")]
    Class,
    #[token("interface")]
    Interface,
    #[token("extends")]
    Extends,
    #[token("implements")]
    Implements,
    #[token("static")]
    Static,
    #[token("void")]
    Void,
    #[token("int")]
    Int,
    #[token("boolean")]
    Boolean,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("new")]
    New,
    #[token("this")]
    This,
    #[token("super")]
    Super,
    #[token("null")]
    Null,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("throw")]
    Throw,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("finally")]
    Finally,

    // Literals
    #[regex(r"[0-9][0-9_]*", |lex| lex.slice().replace('_', "").parse::<i64>().ok())]
    IntLit(i64),

    // Identifiers
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*")]
    Ident,

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=")]
    Eq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("!")]
    Bang,

    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token("...")]
    Ellipsis,
    #[token(".")]
    Dot,

    /// `/* ... */` comment; `true` for `/** ... */` doc comments, which are kept
    /// so declarations can pick up their clauses.
    #[token("/*", |lex| {
        let end = lex.remainder().find("*/")?;
        lex.bump(end + 2);
        let s = lex.slice();
        Some(s.starts_with("/**") && s != "/**/")
    })]
    BlockComment(bool),

    // Comments (skip)
    #[regex(r"//[^\n]*")]
    LineComment,
}

/// Returns true if the given string is a reserved word of the host language.
pub fn is_keyword(s: &str) -> bool {
    matches!(s, "class" | "interface" | "extends" | "implements" | "static" | "void" | "int"
        | "boolean" | "return" | "if" | "else" | "while" | "new" | "this" | "super" | "null"
        | "true" | "false" | "throw" | "try" | "catch" | "finally")
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Class => write!(f, "class"),
            Token::Interface => write!(f, "interface"),
            Token::Extends => write!(f, "extends"),
            Token::Implements => write!(f, "implements"),
            Token::Static => write!(f, "static"),
            Token::Void => write!(f, "void"),
            Token::Int => write!(f, "int"),
            Token::Boolean => write!(f, "boolean"),
            Token::Return => write!(f, "return"),
            Token::If => write!(f, "if"),
            Token::Else => write!(f, "else"),
            Token::While => write!(f, "while"),
            Token::New => write!(f, "new"),
            Token::This => write!(f, "this"),
            Token::Super => write!(f, "super"),
            Token::Null => write!(f, "null"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Throw => write!(f, "throw"),
            Token::Try => write!(f, "try"),
            Token::Catch => write!(f, "catch"),
            Token::Finally => write!(f, "finally"),
            Token::IntLit(n) => write!(f, "{n}"),
            Token::Ident => write!(f, "identifier"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Eq => write!(f, "="),
            Token::EqEq => write!(f, "=="),
            Token::BangEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::LtEq => write!(f, "<="),
            Token::GtEq => write!(f, ">="),
            Token::AmpAmp => write!(f, "&&"),
            Token::PipePipe => write!(f, "||"),
            Token::Bang => write!(f, "!"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Semi => write!(f, ";"),
            Token::Ellipsis => write!(f, "..."),
            Token::Dot => write!(f, "."),
            Token::BlockComment(true) => write!(f, "doc comment"),
            Token::BlockComment(false) => write!(f, "comment"),
            Token::LineComment => write!(f, "comment"),
        }
    }
}
