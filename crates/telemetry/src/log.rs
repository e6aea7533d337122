//! Keeps debug logs readable when payloads are large.

/// Characters kept when a payload is summarised.
pub const SUMMARY_CHARS: usize = 150;

/// Whether debug payloads are logged in full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogVerbosity {
    #[default]
    Summary,
    Verbose,
}

impl LogVerbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose { Self::Verbose } else { Self::Summary }
    }

    /// The payload as it should appear in a debug log line.
    ///
    /// In summary mode the text is cut to [`SUMMARY_CHARS`] characters
    /// (with a `...` marker) and runs of newlines collapse to one.
    pub fn render(self, payload: &str) -> String {
        match self {
            Self::Verbose => payload.to_string(),
            Self::Summary => {
                let cut = match payload.char_indices().nth(SUMMARY_CHARS) {
                    Some((idx, _)) => format!("{}...", &payload[..idx]),
                    None => payload.to_string(),
                };
                collapse_newlines(&cut)
            }
        }
    }

    /// Emit `payload` at debug level, rendered for this verbosity.
    pub fn debug(self, context: &str, payload: &str) {
        tracing::debug!(context, payload = %self.render(payload));
    }
}

fn collapse_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_newline = false;
    for c in text.chars() {
        if c == '\n' {
            if !prev_newline {
                out.push(c);
            }
            prev_newline = true;
        } else {
            out.push(c);
            prev_newline = false;
        }
    }
    out
}
