mod glob;

use regex::Regex;

/// Returns true if `path` matches the CODEOWNERS-style `pattern`.
///
/// This compiles the pattern on every call. When the same pattern is matched
/// against many paths, build a [`Pattern`] once and reuse it.
pub fn matches(path: &str, pattern: &str) -> bool {
    Pattern::new(pattern).is_match(path)
}

/// A single ownership pattern, classified once so that matching a path only
/// has to normalize the path and run the check for the pattern's shape.
///
/// Shapes are tried in a fixed order: the match-all `*`, exact equality,
/// directory rules (`dir/`), extension shorthand (`*.ext`), general globs,
/// and finally bare directory names. A leading `/` on either the pattern or
/// the path is ignored.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    shape: Shape,
}

#[derive(Debug, Clone)]
enum Shape {
    Everything,
    Directory(String),
    Extension(String),
    Glob(Regex),
    DirectoryName,
    Literal,
}

impl Pattern {
    pub fn new(pattern: &str) -> Pattern {
        let shape = Shape::classify(pattern);
        Pattern {
            source: normalize(pattern).to_owned(),
            shape,
        }
    }

    /// The pattern text with any leading slash removed.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, path: &str) -> bool {
        if let Shape::Everything = self.shape {
            return true;
        }

        let path = normalize(path);
        if path == self.source {
            return true;
        }

        match &self.shape {
            Shape::Everything => true,
            Shape::Directory(dir) => path == dir.as_str() || is_within(path, dir),
            Shape::Extension(suffix) => path.ends_with(suffix.as_str()),
            Shape::Glob(regex) => regex.is_match(path),
            Shape::DirectoryName => is_within(path, &self.source),
            Shape::Literal => false,
        }
    }
}

impl Shape {
    fn classify(pattern: &str) -> Shape {
        if pattern == "*" {
            return Shape::Everything;
        }

        let pattern = normalize(pattern);
        if let Some(dir) = pattern.strip_suffix('/') {
            return Shape::Directory(dir.to_owned());
        }
        if pattern.starts_with("*.") {
            return Shape::Extension(pattern[1..].to_owned());
        }
        if pattern.contains('*') {
            // Every literal character is escaped, so translation always yields
            // a valid regex. Fall back to exact matching rather than panic.
            return match Regex::new(&glob::to_regex(pattern)) {
                Ok(regex) => Shape::Glob(regex),
                Err(_) => Shape::Literal,
            };
        }
        if !pattern.contains('.') {
            return Shape::DirectoryName;
        }
        Shape::Literal
    }
}

fn normalize(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

// True if `path` lies somewhere below the directory `dir`.
fn is_within(path: &str, dir: &str) -> bool {
    path.strip_prefix(dir)
        .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_all() {
        for path in ["a", "README.md", "src/app.js", "/deep/nested/dir/file.rs", ".github/x"] {
            assert!(matches(path, "*"), "expected `*` to match {:?}", path);
        }
    }

    #[test]
    fn test_leading_slash_combinations() {
        let examples = [
            ("src", "src/app.js", true),
            ("src", "src", true),
            ("src", "srcx/app.js", false),
            ("src", "lib/src/app.js", false),
            ("docs/api", "docs/api/index.md", true),
            ("docs/api", "docs/apiv2/index.md", false),
            ("src/", "src/app.js", true),
            ("src/app.js", "src/app.js", true),
        ];

        for (pattern, path, expected) in examples {
            let slashed_pattern = format!("/{}", pattern);
            let slashed_path = format!("/{}", path);
            for (pat, p) in [
                (pattern, path),
                (pattern, slashed_path.as_str()),
                (slashed_pattern.as_str(), path),
                (slashed_pattern.as_str(), slashed_path.as_str()),
            ] {
                assert_eq!(
                    matches(p, pat),
                    expected,
                    "expected matches({:?}, {:?}) == {}",
                    p,
                    pat,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_directory_rules() {
        let examples = [
            ("/src/", "src/app.js", true),
            ("/src/", "/src/app.js", true),
            ("/src/", "src", true),
            ("/src/", "src/nested/deep/app.js", true),
            ("/src/", "source/app.js", false),
            ("docs/", "docs", true),
            ("docs/", "lib/docs/readme.md", false),
        ];

        for (pattern, path, expected) in examples {
            assert_eq!(matches(path, pattern), expected, "{:?} vs {:?}", path, pattern);
        }
    }

    #[test]
    fn test_extension_shorthand() {
        let examples = [
            ("*.js", "app.js", true),
            ("*.js", "src/deep/app.js", true),
            ("*.js", "app.jsx", false),
            ("*.js", "app.ts", false),
            ("*.md", "docs/README.md", true),
            ("/*.md", "docs/README.md", true),
        ];

        for (pattern, path, expected) in examples {
            assert_eq!(matches(path, pattern), expected, "{:?} vs {:?}", path, pattern);
        }
    }

    #[test]
    fn test_globs() {
        let examples = [
            ("src/**/*.tsx", "src/Button.tsx", true),
            ("src/**/*.tsx", "src/components/Button.tsx", true),
            ("src/**/*.tsx", "src/a/b/c/Button.tsx", true),
            ("src/**/*.tsx", "lib/Button.tsx", false),
            ("src/**/*.tsx", "src/Button.ts", false),
            ("**/test.js", "test.js", true),
            ("**/test.js", "a/b/test.js", true),
            ("**/test.js", "a/b/mytest.js", false),
            ("docs/**", "docs", true),
            ("docs/**", "docs/a/b.md", true),
            ("docs/**", "docsx/a.md", false),
            ("src/*.js", "src/app.js", true),
            ("src/*.js", "src/lib/app.js", false),
            ("/*", "top.txt", true),
            ("/*", "dir/nested.txt", false),
            ("**", "any/where/at/all", true),
            ("config.*.json", "config.prod.json", true),
            ("config.*.json", "configXprodXjson", false),
        ];

        for (pattern, path, expected) in examples {
            assert_eq!(matches(path, pattern), expected, "{:?} vs {:?}", path, pattern);
        }
    }

    #[test]
    fn test_literal_with_dot() {
        assert!(matches("package.json", "package.json"));
        assert!(matches("/package.json", "package.json"));
        assert!(!matches("sub/package.json", "package.json"));
        assert!(!matches("package.json/x", "package.json"));
    }

    #[test]
    fn test_exact_match_wins_over_shape() {
        // A glob compared against the literal glob text is an exact match
        assert!(matches("src/*.js/x", "src/*.js/x"));
        assert!(matches("weird(dir)/*", "weird(dir)/*"));
    }

    #[test]
    fn test_pattern_reuse() {
        let pattern = Pattern::new("/src/**/*.rs");
        assert_eq!(pattern.as_str(), "src/**/*.rs");
        assert!(pattern.is_match("src/lib.rs"));
        assert!(pattern.is_match("src/parser/mod.rs"));
        assert!(!pattern.is_match("tests/lib.rs"));
    }
}
