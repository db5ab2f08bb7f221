use std::{fs, path::Path};

use crate::ruleset::{Rule, RuleSet};

/// Parse a CODEOWNERS file from a string. Parsing never fails: lines that
/// don't yield a rule are reported in [`ParseResult::skipped`] instead.
pub fn parse(source: &str) -> ParseResult {
    Parser::new(source).parse()
}

/// Read and parse a CODEOWNERS file from disk.
pub fn parse_file(path: &Path) -> std::io::Result<ParseResult> {
    let source = fs::read_to_string(path)?;
    Ok(parse(&source))
}

/// The result of parsing a CODEOWNERS file: the rules in declaration order,
/// plus the lines that were dropped and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    pub rules: Vec<Rule>,
    pub skipped: Vec<SkippedLine>,
}

impl ParseResult {
    pub fn into_ruleset(self) -> RuleSet {
        RuleSet::new(self.rules)
    }
}

/// A non-blank, non-comment line that produced no rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// One-based line number.
    pub line: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The pattern has no owners at all.
    NoOwners,
    /// Every owner was a team reference or otherwise not an individual.
    NoIndividualOwners,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoOwners => write!(f, "no owners"),
            SkipReason::NoIndividualOwners => write!(f, "no individual owners"),
        }
    }
}

/// Classify a raw owner token. Returns the individual identity with any
/// leading `@` removed, or `None` for team references (`@org/team`) and
/// a bare `@`.
pub fn individual_owner(token: &str) -> Option<&str> {
    let owner = token.strip_prefix('@').unwrap_or(token);
    if owner.is_empty() || owner.contains('/') {
        None
    } else {
        Some(owner)
    }
}

struct Parser<'a> {
    source: &'a str,
    skipped: Vec<SkippedLine>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            skipped: Vec::new(),
        }
    }

    fn parse(mut self) -> ParseResult {
        let mut rules = Vec::new();
        for (idx, line) in self.source.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match parse_rule(line) {
                Ok(rule) => rules.push(rule),
                Err(reason) => self.skipped.push(SkippedLine {
                    line: idx + 1,
                    reason,
                }),
            }
        }

        ParseResult {
            rules,
            skipped: self.skipped,
        }
    }
}

fn parse_rule(line: &str) -> Result<Rule, SkipReason> {
    let mut tokens = line.split_whitespace();
    // The caller skips blank lines, so there's always a pattern
    let pattern = tokens.next().unwrap_or_default();

    let candidates: Vec<&str> = tokens.collect();
    if candidates.is_empty() {
        return Err(SkipReason::NoOwners);
    }

    let mut owners: Vec<String> = Vec::with_capacity(candidates.len());
    for owner in candidates.into_iter().filter_map(individual_owner) {
        if !owners.iter().any(|o| o == owner) {
            owners.push(owner.to_owned());
        }
    }

    if owners.is_empty() {
        return Err(SkipReason::NoIndividualOwners);
    }
    Ok(Rule::new(pattern, owners))
}
