// Error kinds for the toolkit.
//
// Every fallible operation in this crate returns `Result<T>`. Syntax errors
// carry a byte offset and a two-line caret diagram so a host can report
// them the way a compiler would; all other kinds carry a descriptive
// message only, per the error design.

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A lexical or grammatical error with source position information.
    #[error("{message} (at byte {offset})\n{excerpt}\n{caret}")]
    Syntax {
        offset: usize,
        message: String,
        excerpt: String,
        caret: String,
    },

    /// A name that resolves to neither a registered provider, a constant,
    /// nor a legal local binding.
    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),

    /// A transform does not implement the requested operation for some
    /// node variant (e.g. differentiating `ceil`, lowering `polar`).
    #[error("not implemented: {0}")]
    Unsupported(String),

    /// Stack-depth accounting or code lowering produced a malformed result.
    #[error("malformed lowering: {0}")]
    Lowering(String),

    /// A back-end failed at runtime (library load, symbol resolution,
    /// code-buffer allocation, ...).
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Attempted to evaluate, lower, or otherwise use an Empty node.
    #[error("invalid (empty) node")]
    InvalidNode,
}

impl Error {
    /// Builds a `Syntax` error with a two-line caret diagram pointing at
    /// `offset` within `source`.
    pub fn syntax(source: &str, offset: usize, message: impl Into<String>) -> Error {
        let (excerpt, caret) = caret_diagram(source, offset);
        Error::Syntax {
            offset,
            message: message.into(),
            excerpt,
            caret,
        }
    }
}

/// Renders a source excerpt and a caret line (`~~^~~`) pointing at the byte
/// offset `offset` within `source`. The excerpt is the full line containing
/// the offset; the caret line has the same leading width so it lines up
/// under a monospace rendering of the excerpt.
pub fn caret_diagram(source: &str, offset: usize) -> (String, String) {
    let offset = offset.min(source.len());
    let line_start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = source[offset..]
        .find('\n')
        .map(|i| offset + i)
        .unwrap_or(source.len());
    let excerpt = &source[line_start..line_end];
    let col = offset - line_start;

    let mut caret = String::with_capacity(col + 1);
    for _ in 0..col {
        caret.push('~');
    }
    caret.push('^');
    (excerpt.to_string(), caret)
}
