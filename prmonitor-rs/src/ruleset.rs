use std::collections::BTreeSet;

use serde::Serialize;

use crate::pattern::Pattern;

/// A single ownership rule: a pattern and the individual owners responsible
/// for paths matching it. Owners never carry a leading `@`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub pattern: String,
    pub owners: Vec<String>,
}

impl Rule {
    pub fn new(pattern: impl Into<String>, owners: Vec<String>) -> Rule {
        Rule {
            pattern: pattern.into(),
            owners,
        }
    }
}

/// An ordered list of rules with their patterns compiled. Order is
/// significant: when several rules match a path, the last one wins.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    patterns: Vec<Pattern>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        let patterns = rules.iter().map(|r| Pattern::new(&r.pattern)).collect();
        Self { rules, patterns }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All rules matching `path`, with their indices, in declaration order.
    pub fn matching_rules(&self, path: &str) -> Vec<(usize, &Rule)> {
        self.patterns
            .iter()
            .enumerate()
            .filter(|(_, pattern)| pattern.is_match(path))
            .map(|(idx, _)| (idx, &self.rules[idx]))
            .collect()
    }

    /// The rule that decides ownership of `path`: the last one that matches.
    pub fn matching_rule(&self, path: &str) -> Option<(usize, &Rule)> {
        self.patterns
            .iter()
            .rposition(|pattern| pattern.is_match(path))
            .map(|idx| (idx, &self.rules[idx]))
    }

    /// Resolve the owners of `path`. Returns an empty set when no rule
    /// matches. Owners from earlier matching rules are replaced, not merged.
    pub fn owners(&self, path: &str) -> BTreeSet<String> {
        self.matching_rule(path)
            .map(|(_, rule)| rule.owners.iter().cloned().collect())
            .unwrap_or_default()
    }
}

pub struct RuleSetBuilder {
    rules: Vec<Rule>,
}

impl RuleSetBuilder {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add(&mut self, rule: Rule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn build(self) -> RuleSet {
        RuleSet::new(self.rules)
    }
}

impl Default for RuleSetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ruleset(rules: &[(&str, &[&str])]) -> RuleSet {
        let mut builder = RuleSetBuilder::new();
        for (pattern, owners) in rules {
            builder.add(Rule::new(
                *pattern,
                owners.iter().map(|o| o.to_string()).collect(),
            ));
        }
        builder.build()
    }

    fn owners(owners: &[&str]) -> BTreeSet<String> {
        owners.iter().map(|o| o.to_string()).collect()
    }

    fn layered() -> RuleSet {
        ruleset(&[
            ("*", &["default"]),
            ("*.js", &["js-team"]),
            ("src/", &["src-owner"]),
            ("src/critical.js", &["tech-lead"]),
        ])
    }

    #[test]
    fn test_last_match_wins() {
        let rules = layered();
        assert_eq!(rules.owners("src/critical.js"), owners(&["tech-lead"]));
        assert_eq!(rules.owners("src/app.js"), owners(&["src-owner"]));
        assert_eq!(rules.owners("lib/app.js"), owners(&["js-team"]));
        assert_eq!(rules.owners("unknown.txt"), owners(&["default"]));
    }

    #[test]
    fn test_declaration_order_beats_specificity() {
        let rules = ruleset(&[
            ("src/critical.js", &["tech-lead"]),
            ("src/", &["src-owner"]),
        ]);
        assert_eq!(rules.owners("src/critical.js"), owners(&["src-owner"]));
    }

    #[test]
    fn test_duplicate_patterns() {
        let rules = ruleset(&[("docs/", &["alice"]), ("docs/", &["bob", "carol"])]);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.owners("docs/index.md"), owners(&["bob", "carol"]));
    }

    #[test]
    fn test_no_match() {
        let rules = ruleset(&[("*.rs", &["rustacean"])]);
        assert!(rules.owners("README.md").is_empty());
        assert!(rules.matching_rule("README.md").is_none());
        assert!(RuleSet::new(vec![]).owners("anything").is_empty());
    }

    #[test]
    fn test_matching_rules() {
        let rules = layered();
        let indices: Vec<usize> = rules
            .matching_rules("src/critical.js")
            .into_iter()
            .map(|(idx, _)| idx)
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);

        let (idx, rule) = rules.matching_rule("README.md").unwrap();
        assert_eq!(idx, 0);
        assert_eq!(rule.pattern, "*");
    }

    #[test]
    fn test_matched_rules_outlive_path() {
        let rules = layered();
        let (last, all) = {
            let path = format!("src/{}.js", "critical");
            (rules.matching_rule(&path), rules.matching_rules(&path))
        };
        assert_eq!(
            last.map(|(_, rule)| rule.owners.clone()),
            Some(vec!["tech-lead".to_owned()])
        );
        assert_eq!(all.len(), 4);
    }
}
