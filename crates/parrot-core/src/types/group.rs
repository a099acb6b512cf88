//! Group types

use serde::{Deserialize, Serialize};

use super::{GroupId, Identity};

/// A group as last seen through management messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Identity that created (and manages) the group
    pub creator: Identity,
    /// Identifier chosen by the creator
    pub group_id: GroupId,
    #[serde(default)]
    pub name: String,
    /// Members in the order the creator announced them
    #[serde(default)]
    pub members: Vec<Identity>,
}

impl Group {
    /// Store key: groups are distinct per creator
    pub fn key(&self) -> (Identity, GroupId) {
        (self.creator, self.group_id)
    }

    /// Members that are not `own`
    pub fn recipients<'a>(&'a self, own: &'a Identity) -> impl Iterator<Item = &'a Identity> + 'a {
        self.members.iter().filter(move |m| *m != own)
    }
}

/// Partial group change carried by a single management message
///
/// `None` fields leave the stored value untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupUpdate {
    pub creator: Identity,
    pub group_id: GroupId,
    pub name: Option<String>,
    pub members: Option<Vec<Identity>>,
}

impl GroupUpdate {
    /// Name-only update
    pub fn name(creator: Identity, group_id: GroupId, name: impl Into<String>) -> Self {
        Self {
            creator,
            group_id,
            name: Some(name.into()),
            members: None,
        }
    }

    /// Members-only update
    pub fn members(creator: Identity, group_id: GroupId, members: Vec<Identity>) -> Self {
        Self {
            creator,
            group_id,
            name: None,
            members: Some(members),
        }
    }

    /// Apply this update on top of an existing record (or an empty one).
    ///
    /// A members update replaces the whole member list; it does not union.
    pub fn apply(self, existing: Option<Group>) -> Group {
        let mut group = existing.unwrap_or(Group {
            creator: self.creator,
            group_id: self.group_id,
            name: String::new(),
            members: Vec::new(),
        });
        if let Some(name) = self.name {
            group.name = name;
        }
        if let Some(members) = self.members {
            group.members = members;
        }
        group
    }
}
