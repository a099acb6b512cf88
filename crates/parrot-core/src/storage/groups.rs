//! Group directory - groups keyed by (creator, group id)

use std::path::Path;

use super::FileBacked;
use crate::error::AgentResult;
use crate::types::{Group, GroupId, GroupUpdate, Identity};

/// Local group directory
pub struct GroupStore {
    file: FileBacked<(Identity, GroupId), Group>,
}

impl GroupStore {
    /// Load the group directory at `path` (empty if the file is missing)
    pub fn load(path: impl AsRef<Path>) -> AgentResult<Self> {
        Ok(Self {
            file: FileBacked::load(path, Group::key)?,
        })
    }

    /// Look up a group by creator and id
    pub fn lookup(&self, creator: &Identity, group_id: &GroupId) -> Option<Group> {
        self.file.get(&(*creator, *group_id))
    }

    /// Merge a partial update into the stored group and return the result.
    ///
    /// Fields the update does not carry keep their stored values, so a
    /// name change never drops members and vice versa.
    pub fn upsert(&self, update: GroupUpdate) -> Group {
        let key = (update.creator, update.group_id);
        self.file.update(key, |existing| update.apply(existing))
    }

    /// Save the group directory to disk
    pub fn persist(&self) -> AgentResult<()> {
        self.file.persist()
    }

    /// Save only if there are unsaved changes
    pub fn flush(&self) -> AgentResult<bool> {
        self.file.flush()
    }

    pub fn is_dirty(&self) -> bool {
        self.file.is_dirty()
    }

    pub fn save_count(&self) -> u64 {
        self.file.save_count()
    }

    pub fn len(&self) -> usize {
        self.file.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every group
    pub fn snapshot(&self) -> Vec<Group> {
        self.file.values()
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
