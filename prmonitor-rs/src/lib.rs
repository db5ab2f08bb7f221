pub mod changeset;
pub mod config;
pub mod github;
pub mod health;
pub mod monitor;
pub mod notify;
pub mod parser;
pub mod pattern;
pub mod report;
mod ruleset;

use std::{io, path::Path};

pub use changeset::{changeset_owners, ChangesetOwners};
pub use ruleset::{Rule, RuleSet, RuleSetBuilder};

/// Read a CODEOWNERS file from disk and build a [`RuleSet`] from it.
pub fn from_path(path: impl AsRef<Path>) -> io::Result<RuleSet> {
    let result = parser::parse_file(path.as_ref())?;
    let mut builder = RuleSetBuilder::new();
    for rule in result.rules {
        builder.add(rule);
    }
    Ok(builder.build())
}
