use crate::parser::ast::DeclId;
use crate::span::Span;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("Syntax error: {msg}")]
    Syntax { msg: String, span: Span },

    #[error("Type error: {msg}")]
    Type { msg: String, span: Span },

    #[error("I/O error: {msg}")]
    Io { msg: String, path: PathBuf },

    #[error("Config error: {msg}")]
    Config { msg: String, path: PathBuf },
}

impl CompileError {
    pub fn syntax(msg: impl Into<String>, span: Span) -> Self {
        Self::Syntax { msg: msg.into(), span }
    }

    pub fn type_err(msg: impl Into<String>, span: Span) -> Self {
        Self::Type { msg: msg.into(), span }
    }

    pub fn io(msg: impl Into<String>, path: PathBuf) -> Self {
        Self::Io { msg: msg.into(), path }
    }

    pub fn config(msg: impl Into<String>, path: PathBuf) -> Self {
        Self::Config { msg: msg.into(), path }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::Syntax { span, .. } | CompileError::Type { span, .. } => Some(*span),
            _ => None,
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, CompileError::Syntax { .. })
    }

    pub fn is_type(&self) -> bool {
        matches!(self, CompileError::Type { .. })
    }
}

/// An error attributed to the declaration whose clause or body produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub decl: Option<DeclId>,
    pub error: CompileError,
}

/// A soundness gap: an invariant check that is legitimately skipped because a
/// call path lacks effect declarations. Informational, never an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub msg: String,
    pub span: Span,
}

/// Everything the contract passes report for one compilation unit.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub errors: Vec<Diagnostic>,
    pub notes: Vec<Note>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, decl: Option<DeclId>, error: CompileError) {
        self.errors.push(Diagnostic { decl, error });
    }

    pub fn note(&mut self, msg: impl Into<String>, span: Span) {
        self.notes.push(Note { msg: msg.into(), span });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors_for(&self, decl: DeclId) -> impl Iterator<Item = &CompileError> {
        self.errors.iter().filter(move |d| d.decl == Some(decl)).map(|d| &d.error)
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
        self.notes.extend(other.notes);
    }
}

/// Render a CompileError with ariadne for nice terminal output.
pub fn render_error(source: &str, filename: &str, err: &CompileError) {
    match err {
        CompileError::Syntax { msg, span } | CompileError::Type { msg, span } => {
            let kind_str = if err.is_syntax() { "syntax" } else { "type" };
            let report = build_report(ariadne::ReportKind::Error, kind_str, msg, *span);
            let _ = report.eprint(ariadne::Source::from(source));
        }
        CompileError::Io { msg, path } => {
            eprintln!("error[io]: {msg}");
            eprintln!("  --> {}", path.display());
        }
        CompileError::Config { msg, path } => {
            eprintln!("error[config]: {msg}");
            eprintln!("  --> {}", path.display());
        }
    }
    tracing::trace!(file = filename, "rendered diagnostic");
}

/// Render a soundness-gap note.
pub fn render_note(source: &str, note: &Note) {
    let report = build_report(ariadne::ReportKind::Advice, "soundness gap", &note.msg, note.span);
    let _ = report.eprint(ariadne::Source::from(source));
}

/// Render a runtime failure at a clause, with the site where it was checked
/// as a second label.
pub fn render_failure(source: &str, title: &str, msg: &str, span: Span, site: Option<Span>) {
    let mut report = ariadne::Report::build(ariadne::ReportKind::Error, (), span.start)
        .with_message(title.to_string())
        .with_label(ariadne::Label::new(span.start..span.end).with_message(msg.to_string()));
    if let Some(site) = site {
        report = report.with_label(ariadne::Label::new(site.start..site.end).with_message("checked here"));
    }
    let _ = report.finish().eprint(ariadne::Source::from(source));
}

/// Render a diagnostic into a plain string (no colors), for tests and tooling.
pub fn render_to_string(source: &str, err: &CompileError) -> String {
    let Some(span) = err.span() else {
        return err.to_string();
    };
    let kind_str = if err.is_syntax() { "syntax" } else { "type" };
    let msg = match err {
        CompileError::Syntax { msg, .. } | CompileError::Type { msg, .. } => msg.as_str(),
        _ => "",
    };
    let report = ariadne::Report::build(ariadne::ReportKind::Error, (), span.start)
        .with_config(ariadne::Config::default().with_color(false))
        .with_message(format!("{kind_str} error"))
        .with_label(ariadne::Label::new(span.start..span.end).with_message(msg))
        .finish();
    let mut out = Vec::new();
    match report.write(ariadne::Source::from(source), &mut out) {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => err.to_string(),
    }
}

fn build_report(
    kind: ariadne::ReportKind<'static>,
    title: &str,
    msg: &str,
    span: Span,
) -> ariadne::Report<'static, std::ops::Range<usize>> {
    ariadne::Report::build(kind, (), span.start)
        .with_message(title.to_string())
        .with_label(ariadne::Label::new(span.start..span.end).with_message(msg.to_string()))
        .finish()
}
