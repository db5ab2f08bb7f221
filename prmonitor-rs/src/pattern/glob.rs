use memchr::memmem;

/// Wildcard forms recognised inside a general glob, in the order they are
/// extracted from the pattern. Earlier forms are pulled out before later ones
/// so that e.g. the `**` inside `**/` is never seen as a bare double star.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wildcard {
    /// `**/`: zero or more leading directories.
    AnyDirectories,
    /// `/**`: optionally a slash followed by anything.
    AnySuffix,
    /// `**`: anything, separators included.
    AnyPath,
    /// `*`: anything within a single path segment.
    AnySegment,
}

impl Wildcard {
    const STAGES: [Wildcard; 4] = [
        Wildcard::AnyDirectories,
        Wildcard::AnySuffix,
        Wildcard::AnyPath,
        Wildcard::AnySegment,
    ];

    fn marker(self) -> &'static str {
        match self {
            Wildcard::AnyDirectories => "**/",
            Wildcard::AnySuffix => "/**",
            Wildcard::AnyPath => "**",
            Wildcard::AnySegment => "*",
        }
    }

    fn regex(self) -> &'static str {
        match self {
            Wildcard::AnyDirectories => "(?:.*/)?",
            Wildcard::AnySuffix => "(?:/.*)?",
            Wildcard::AnyPath => ".*",
            Wildcard::AnySegment => "[^/]*",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Literal(&'a str),
    Wildcard(Wildcard),
}

/// Split a glob into literal runs and wildcards. Each stage only looks inside
/// the literal runs left over by the stages before it.
pub(crate) fn tokenize(pattern: &str) -> Vec<Token<'_>> {
    let mut tokens = vec![Token::Literal(pattern)];
    for wildcard in Wildcard::STAGES {
        tokens = extract(tokens, wildcard);
    }
    tokens
}

fn extract(tokens: Vec<Token<'_>>, wildcard: Wildcard) -> Vec<Token<'_>> {
    let marker = wildcard.marker();
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        let Token::Literal(text) = token else {
            out.push(token);
            continue;
        };

        // Markers are ASCII, so the byte offsets are always char boundaries
        let mut start = 0;
        for idx in memmem::find_iter(text.as_bytes(), marker.as_bytes()) {
            if idx > start {
                out.push(Token::Literal(&text[start..idx]));
            }
            out.push(Token::Wildcard(wildcard));
            start = idx + marker.len();
        }
        if start < text.len() {
            out.push(Token::Literal(&text[start..]));
        }
    }
    out
}

/// Translate a glob into a regex source string anchored at both ends.
pub(crate) fn to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push_str(r"\A");
    for token in tokenize(pattern) {
        match token {
            Token::Literal(text) => {
                for c in text.chars() {
                    if regex_syntax::is_meta_character(c) {
                        regex.push('\\');
                    }
                    regex.push(c);
                }
            }
            Token::Wildcard(wildcard) => regex.push_str(wildcard.regex()),
        }
    }
    regex.push_str(r"\z");
    regex
}
