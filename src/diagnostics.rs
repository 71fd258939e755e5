//! Human-readable rendering of a [`CompileError`]: `file:line:col: phase:
//! message`, with a caret line under the offending span when the source is
//! available.

use crate::error::CompileError;

/// Format `err` against `source`, the text it was produced from, with a
/// caret pointing at the start of its span. `file` is used only for the
/// leading location text; pass `"<stdin>"` for REPL input.
pub fn render(err: &CompileError, file: &str, source: &str) -> String {
    let mut out = format!("{file}:{}: {}: {}\n", err.span.start, err.phase, err.cause);
    if let Some(line) = source.lines().nth(err.span.start.line as usize - 1) {
        out.push_str(line);
        out.push('\n');
        let col = err.span.start.col.saturating_sub(1) as usize;
        out.push_str(&" ".repeat(col));
        out.push('^');
    }
    out
}
