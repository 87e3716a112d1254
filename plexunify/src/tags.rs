//! Tag Reconciliation Engine
//!
//! Applies genre rename rules to one movie. For each rule a single resolved
//! target id is carried across all of the rule's sources:
//!
//! - target already in the catalog: memberships pointing at a source tag are
//!   rewritten to the target tag
//! - target missing: the first source tag present is renamed in place and
//!   becomes the target; later sources fold onto it
//!
//! A source membership of a movie that already holds the target is removed
//! instead of rewritten. So sources `{A, B}` into a missing `T` always leave
//! exactly one `T`, and each movie references it at most once.
//! Renames are catalog wide; the catalog handed to [`reconcile`] must
//! already reflect renames staged for earlier movies.

use crate::config::RenameRule;
use crate::ledger::{Column, FieldValue, MutationLedger, Target};
use std::collections::HashMap;
use tracing::debug;

/// Tag names of one taxonomy, keyed case-insensitively
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagCatalog {
    by_name: HashMap<String, i64>,
    names: HashMap<i64, String>,
}

impl TagCatalog {
    /// Build from (id, name) rows; on a case-insensitive clash the first row wins
    pub fn from_entries(entries: impl IntoIterator<Item = (i64, String)>) -> Self {
        let mut catalog = Self::default();
        for (id, name) in entries {
            catalog.by_name.entry(name.to_lowercase()).or_insert(id);
            catalog.names.insert(id, name);
        }
        catalog
    }

    /// Apply renames that are staged but not yet committed
    pub fn overlay<'n>(&mut self, renames: impl IntoIterator<Item = (i64, &'n str)>) {
        for (id, name) in renames {
            if self.names.contains_key(&id) {
                self.rename(id, name);
            }
        }
    }

    pub fn id_of(&self, name: &str) -> Option<i64> {
        self.by_name.get(&name.to_lowercase()).copied()
    }

    pub fn name_of(&self, id: i64) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    fn rename(&mut self, id: i64, new_name: &str) {
        if let Some(old) = self.names.insert(id, new_name.to_string()) {
            let old_key = old.to_lowercase();
            if self.by_name.get(&old_key) == Some(&id) {
                self.by_name.remove(&old_key);
            }
        }
        self.by_name.insert(new_name.to_lowercase(), id);
    }
}

/// One movie's memberships: tagging id -> tag id
pub type TaggingMembership = Vec<(i64, i64)>;

/// In-place rename of a catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRename {
    pub tag_id: i64,
    pub from: String,
    pub to: String,
}

/// A membership repointed to another tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipRewrite {
    pub tagging_id: i64,
    pub from_tag: i64,
    pub to_tag: i64,
}

/// A source membership dropped because the movie already holds the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipRemoval {
    pub tagging_id: i64,
    pub tag_id: i64,
}

/// Outcome of reconciling one movie
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub renames: Vec<TagRename>,
    pub rewrites: Vec<MembershipRewrite>,
    pub removals: Vec<MembershipRemoval>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.renames.is_empty() && self.rewrites.is_empty() && self.removals.is_empty()
    }

    /// Stage every rename and rewrite, recording the replaced values as baselines
    pub fn stage_into(&self, ledger: &mut MutationLedger) {
        for rename in &self.renames {
            let target = Target::Tag(rename.tag_id);
            ledger.observe(target, Column::Tag, FieldValue::Text(rename.from.clone()));
            ledger.label(target, format!("genre '{}'", rename.from));
            ledger.stage(target, Column::Tag, rename.to.as_str());
        }
        for rewrite in &self.rewrites {
            let target = Target::Tagging(rewrite.tagging_id);
            ledger.observe(target, Column::TagId, FieldValue::Integer(rewrite.from_tag));
            ledger.stage(target, Column::TagId, rewrite.to_tag);
        }
        for removal in &self.removals {
            ledger.stage_removal(removal.tagging_id);
        }
    }
}

/// Resolve `rules` against a catalog and one movie's memberships
///
/// Pure: inputs are not modified. The returned renames must be staged for
/// later movies to observe them.
pub fn reconcile(
    catalog: &TagCatalog,
    memberships: &TaggingMembership,
    rules: &[RenameRule],
) -> Reconciliation {
    let mut catalog = catalog.clone();
    let mut memberships = memberships.clone();
    let mut result = Reconciliation::default();

    for rule in rules {
        let target_key = rule.target.to_lowercase();
        let mut resolved = catalog.id_of(&rule.target);

        for source in &rule.sources {
            if source.to_lowercase() == target_key {
                continue;
            }
            let Some(source_id) = catalog.id_of(source) else {
                continue;
            };

            match resolved {
                None => {
                    let from = catalog.name_of(source_id).unwrap_or(source.as_str()).to_string();
                    debug!(from = %from, to = %rule.target, tag_id = source_id, "Renaming tag in place");
                    catalog.rename(source_id, &rule.target);
                    result.renames.push(TagRename {
                        tag_id: source_id,
                        from,
                        to: rule.target.clone(),
                    });
                    resolved = Some(source_id);
                }
                Some(target_id) if target_id != source_id => {
                    let mut holds_target = memberships.iter().any(|(_, tag_id)| *tag_id == target_id);
                    memberships.retain_mut(|(tagging_id, tag_id)| {
                        if *tag_id != source_id {
                            return true;
                        }
                        if holds_target {
                            debug!(tagging_id = *tagging_id, tag_id = source_id, "Dropping duplicate membership");
                            result.removals.push(MembershipRemoval {
                                tagging_id: *tagging_id,
                                tag_id: source_id,
                            });
                            return false;
                        }
                        result.rewrites.push(MembershipRewrite {
                            tagging_id: *tagging_id,
                            from_tag: source_id,
                            to_tag: target_id,
                        });
                        *tag_id = target_id;
                        holds_target = true;
                        true
                    });
                }
                Some(_) => {}
            }
        }
    }

    result
}
