//! Mutation Ledger
//!
//! In-memory staging area for every pending write of one run. Components
//! stage structured values; the store adapter turns the resulting
//! [`CommitPlan`] into parameterized statements.
//!
//! Staged values equal to the observed baseline of the row are dropped when
//! the plan is built, so re-running over an already processed catalog
//! produces an empty plan.

use crate::types::MediaRecord;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;

/// Catalog table touched by an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    MetadataItems,
    Tags,
    Taggings,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::MetadataItems => "metadata_items",
            Table::Tags => "tags",
            Table::Taggings => "taggings",
        }
    }
}

/// Updatable column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Title,
    TitleSort,
    OriginalTitle,
    Tagline,
    ContentRating,
    Summary,
    UserThumbUrl,
    UserFields,
    /// `tags.tag`
    Tag,
    /// `taggings.tag_id`
    TagId,
}

impl Column {
    pub fn name(self) -> &'static str {
        match self {
            Column::Title => "title",
            Column::TitleSort => "title_sort",
            Column::OriginalTitle => "original_title",
            Column::Tagline => "tagline",
            Column::ContentRating => "content_rating",
            Column::Summary => "summary",
            Column::UserThumbUrl => "user_thumb_url",
            Column::UserFields => "user_fields",
            Column::Tag => "tag",
            Column::TagId => "tag_id",
        }
    }

    pub fn table(self) -> Table {
        match self {
            Column::Tag => Table::Tags,
            Column::TagId => Table::Taggings,
            _ => Table::MetadataItems,
        }
    }
}

/// Row addressed by an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    MetadataItem(i64),
    Tag(i64),
    Tagging(i64),
}

impl Target {
    pub fn table(self) -> Table {
        match self {
            Target::MetadataItem(_) => Table::MetadataItems,
            Target::Tag(_) => Table::Tags,
            Target::Tagging(_) => Table::Taggings,
        }
    }

    pub fn id(self) -> i64 {
        match self {
            Target::MetadataItem(id) | Target::Tag(id) | Target::Tagging(id) => id,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.table().name(), self.id())
    }
}

/// Structured column value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{:?}", s),
            FieldValue::Integer(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

/// Membership row to insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NewTagging {
    pub metadata_item_id: i64,
    pub tag_id: i64,
}

/// Collection to reclassify as deleted, with its tag and memberships removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDeletion {
    pub collection_id: i64,
    pub tag_id: Option<i64>,
    pub title: String,
}

/// File written at flush time, once the catalog transaction committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingArtifact {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Changes to one row
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    pub target: Target,
    pub label: Option<String>,
    pub changes: Vec<(Column, FieldValue)>,
}

/// Everything one flush applies
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitPlan {
    pub updates: Vec<RowUpdate>,
    pub insertions: Vec<NewTagging>,
    /// Taggings to delete, by id
    pub removals: Vec<i64>,
    pub deletions: Vec<CollectionDeletion>,
    pub artifacts: Vec<PendingArtifact>,
}

impl CommitPlan {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
            && self.insertions.is_empty()
            && self.removals.is_empty()
            && self.deletions.is_empty()
            && self.artifacts.is_empty()
    }

    /// Updates touching `table`
    pub fn updates_for(&self, table: Table) -> impl Iterator<Item = &RowUpdate> {
        self.updates.iter().filter(move |u| u.target.table() == table)
    }

    pub fn summary(&self) -> CommitSummary {
        CommitSummary {
            record_updates: self.updates_for(Table::MetadataItems).count(),
            tag_updates: self.updates_for(Table::Tags).count(),
            tagging_updates: self.updates_for(Table::Taggings).count(),
            insertions: self.insertions.len(),
            removals: self.removals.len(),
            deletions: self.deletions.len(),
            artifacts: self.artifacts.len(),
        }
    }

    /// Human readable description, one line per change
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();

        for update in &self.updates {
            let subject = match &update.label {
                Some(label) => format!("{} ({})", label, update.target),
                None => update.target.to_string(),
            };
            for (column, value) in &update.changes {
                lines.push(format!("{}: {} = {}", subject, column.name(), value));
            }
        }
        for insertion in &self.insertions {
            lines.push(format!(
                "metadata_items #{}: add membership of tag #{}",
                insertion.metadata_item_id, insertion.tag_id
            ));
        }
        for tagging_id in &self.removals {
            lines.push(format!("taggings #{}: remove duplicate membership", tagging_id));
        }
        for deletion in &self.deletions {
            lines.push(format!(
                "'{}' (metadata_items #{}): delete collection",
                deletion.title, deletion.collection_id
            ));
        }
        for artifact in &self.artifacts {
            lines.push(format!(
                "write {} ({} bytes)",
                artifact.path.display(),
                artifact.bytes.len()
            ));
        }

        lines
    }
}

/// Counts per change kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub record_updates: usize,
    pub tag_updates: usize,
    pub tagging_updates: usize,
    pub insertions: usize,
    pub removals: usize,
    pub deletions: usize,
    pub artifacts: usize,
}

impl fmt::Display for CommitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} record update(s), {} tag update(s), {} membership update(s), {} new membership(s), {} membership removal(s), {} collection deletion(s), {} file(s)",
            self.record_updates,
            self.tag_updates,
            self.tagging_updates,
            self.insertions,
            self.removals,
            self.deletions,
            self.artifacts
        )
    }
}

/// Staging area for one run
#[derive(Debug, Default)]
pub struct MutationLedger {
    staged: BTreeMap<Target, BTreeMap<Column, FieldValue>>,
    baselines: HashMap<(Target, Column), FieldValue>,
    labels: HashMap<Target, String>,
    insertions: BTreeSet<NewTagging>,
    removals: BTreeSet<i64>,
    deletions: BTreeMap<i64, CollectionDeletion>,
    artifacts: BTreeMap<PathBuf, Vec<u8>>,
}

impl MutationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the stored values of a record's updatable columns
    pub fn observe_record(&mut self, record: &MediaRecord) {
        let target = Target::MetadataItem(record.id);
        let columns = [
            (Column::Title, &record.title),
            (Column::TitleSort, &record.title_sort),
            (Column::OriginalTitle, &record.original_title),
            (Column::Tagline, &record.tagline),
            (Column::ContentRating, &record.content_rating),
            (Column::Summary, &record.summary),
            (Column::UserThumbUrl, &record.user_thumb_url),
        ];
        for (column, value) in columns {
            self.observe(target, column, FieldValue::Text(value.clone()));
        }
        self.observe(
            target,
            Column::UserFields,
            FieldValue::Text(record.locks.original().to_string()),
        );
        self.labels.insert(target, format!("'{}'", record.title));
    }

    /// Record the stored value of one column; the first observation sticks
    pub fn observe(&mut self, target: Target, column: Column, value: FieldValue) {
        self.baselines.entry((target, column)).or_insert(value);
    }

    /// Attach a human readable name used when describing the plan
    pub fn label(&mut self, target: Target, label: impl Into<String>) {
        self.labels.insert(target, label.into());
    }

    /// Stage a column value; staging the same column again overwrites it
    pub fn stage(&mut self, target: Target, column: Column, value: impl Into<FieldValue>) {
        debug_assert_eq!(target.table(), column.table(), "column staged on wrong table");
        self.staged
            .entry(target)
            .or_default()
            .insert(column, value.into());
    }

    /// Currently staged value of a column
    pub fn staged_value(&self, target: Target, column: Column) -> Option<&FieldValue> {
        self.staged.get(&target).and_then(|columns| columns.get(&column))
    }

    /// Staged tag renames as (tag id, new name)
    pub fn staged_tag_names(&self) -> impl Iterator<Item = (i64, &str)> {
        self.staged.iter().filter_map(|(target, columns)| match (target, columns.get(&Column::Tag)) {
            (Target::Tag(id), Some(FieldValue::Text(name))) => Some((*id, name.as_str())),
            _ => None,
        })
    }

    /// Stage a membership insertion; returns false when already staged
    pub fn stage_insertion(&mut self, metadata_item_id: i64, tag_id: i64) -> bool {
        self.insertions.insert(NewTagging {
            metadata_item_id,
            tag_id,
        })
    }

    pub fn has_insertion(&self, metadata_item_id: i64, tag_id: i64) -> bool {
        self.insertions.contains(&NewTagging {
            metadata_item_id,
            tag_id,
        })
    }

    /// Records with a pending membership of `tag_id`
    pub fn pending_members(&self, tag_id: i64) -> Vec<i64> {
        self.insertions
            .iter()
            .filter(|n| n.tag_id == tag_id)
            .map(|n| n.metadata_item_id)
            .collect()
    }

    /// Stage deletion of one tagging; pending updates of that row are dropped
    pub fn stage_removal(&mut self, tagging_id: i64) {
        self.removals.insert(tagging_id);
    }

    /// Stage a collection deletion; a collection is queued at most once
    pub fn stage_deletion(&mut self, deletion: CollectionDeletion) -> bool {
        if self.deletions.contains_key(&deletion.collection_id) {
            return false;
        }
        self.deletions.insert(deletion.collection_id, deletion);
        true
    }

    pub fn is_deletion_staged(&self, collection_id: i64) -> bool {
        self.deletions.contains_key(&collection_id)
    }

    /// Stage a file to write at flush time
    pub fn stage_artifact(&mut self, path: PathBuf, bytes: Vec<u8>) {
        self.artifacts.insert(path, bytes);
    }

    /// Build the plan, dropping values equal to their observed baseline
    pub fn plan(&self) -> CommitPlan {
        let mut updates = Vec::new();

        for (target, columns) in &self.staged {
            if let Target::Tagging(id) = target {
                if self.removals.contains(id) {
                    continue;
                }
            }
            let changes: Vec<(Column, FieldValue)> = columns
                .iter()
                .filter(|(column, value)| self.baselines.get(&(*target, **column)) != Some(*value))
                .map(|(column, value)| (*column, value.clone()))
                .collect();

            if !changes.is_empty() {
                updates.push(RowUpdate {
                    target: *target,
                    label: self.labels.get(target).cloned(),
                    changes,
                });
            }
        }

        CommitPlan {
            updates,
            insertions: self.insertions.iter().copied().collect(),
            removals: self.removals.iter().copied().collect(),
            deletions: self.deletions.values().cloned().collect(),
            artifacts: self
                .artifacts
                .iter()
                .map(|(path, bytes)| PendingArtifact {
                    path: path.clone(),
                    bytes: bytes.clone(),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.plan().is_empty()
    }

    /// Drop everything staged; baselines are kept for the rest of the run
    pub fn clear(&mut self) {
        self.staged.clear();
        self.insertions.clear();
        self.removals.clear();
        self.deletions.clear();
        self.artifacts.clear();
    }
}
