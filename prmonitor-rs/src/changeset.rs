use std::collections::BTreeSet;

use crate::ruleset::RuleSet;

/// Owners resolved across every file in a changeset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangesetOwners {
    /// Union of the owners of each file.
    pub owners: BTreeSet<String>,
    /// Files no rule matched, sorted.
    pub unowned: BTreeSet<String>,
}

impl ChangesetOwners {
    /// Resolve each path against `ruleset` and merge the results. The outcome
    /// does not depend on the order of `paths`.
    pub fn resolve<I, P>(ruleset: &RuleSet, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let mut result = Self::default();
        for path in paths {
            let path = path.as_ref();
            let owners = ruleset.owners(path);
            if owners.is_empty() {
                result.unowned.insert(path.to_owned());
            } else {
                result.owners.extend(owners);
            }
        }
        result
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Deduplicated union of the owners of every path in the changeset.
pub fn changeset_owners<I, P>(ruleset: &RuleSet, paths: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = P>,
    P: AsRef<str>,
{
    ChangesetOwners::resolve(ruleset, paths).owners
}
