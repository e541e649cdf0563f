use serde::{Deserialize, Serialize};
use std::fmt;

pub type Subject = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub subjects: Vec<Subject>,
    pub importance: f64,
    pub owner: PlayerId,
}

impl Item {
    pub fn new(id: u64, subjects: &[Subject], importance: f64, owner: PlayerId) -> Self {
        Self {
            id: ItemId(id),
            subjects: subjects.to_vec(),
            importance,
            owner,
        }
    }

    pub fn has_subject(&self, subject: Subject) -> bool {
        self.subjects.contains(&subject)
    }

    pub fn shares_subject_with(&self, other: &Item) -> bool {
        self.subjects.iter().any(|s| other.has_subject(*s))
    }
}

/// One position in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Slot {
    Item(Item),
    Pause,
}

impl Slot {
    pub fn item(&self) -> Option<&Item> {
        match self {
            Self::Item(item) => Some(item),
            Self::Pause => None,
        }
    }

    pub fn is_pause(&self) -> bool {
        matches!(self, Self::Pause)
    }
}

impl From<Item> for Slot {
    fn from(value: Item) -> Self {
        Self::Item(value)
    }
}

impl From<Option<Item>> for Slot {
    fn from(value: Option<Item>) -> Self {
        value.map(Self::Item).unwrap_or(Self::Pause)
    }
}

pub fn format_slot(slot: &Slot) -> String {
    match slot {
        Slot::Pause => "(pause)".to_string(),
        Slot::Item(item) => format!(
            "{} {} subjects={:?} importance={:.2}",
            item.owner, item.id, item.subjects, item.importance
        ),
    }
}
