use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub type EntityId = u64;

/// Level of an entity in the three-level tree.
///
/// A `Leaf` always belongs to one `Mid`; a `Mid` belongs to at most one `Top`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Leaf,
    Mid,
    Top,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Leaf => write!(f, "leaf"),
            EntityKind::Mid => write!(f, "mid"),
            EntityKind::Top => write!(f, "top"),
        }
    }
}

impl FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "leaf" => Ok(EntityKind::Leaf),
            "mid" => Ok(EntityKind::Mid),
            "top" => Ok(EntityKind::Top),
            other => Err(CoreError::InvalidRef(format!("unknown entity kind '{other}'"))),
        }
    }
}

/// Reference to exactly one entity of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityRef {
    pub fn leaf(id: EntityId) -> Self {
        Self { kind: EntityKind::Leaf, id }
    }

    pub fn mid(id: EntityId) -> Self {
        Self { kind: EntityKind::Mid, id }
    }

    pub fn top(id: EntityId) -> Self {
        Self { kind: EntityKind::Top, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Parses the `kind:id` form produced by `Display`.
impl FromStr for EntityRef {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| CoreError::InvalidRef(s.to_string()))?;
        let id = id
            .trim()
            .parse()
            .map_err(|_| CoreError::InvalidRef(s.to_string()))?;
        Ok(Self { kind: kind.trim().parse()?, id })
    }
}

/// What happened to annotated objects in one activity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Create,
    Update,
    Delete,
}

/// One raw activity record of a leaf: the input of primary metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub timestamp: DateTime<Utc>,
    pub action: ActivityAction,
    /// Number of objects affected.
    pub objects: u64,
    /// Time spent working, in milliseconds.
    #[serde(default)]
    pub working_time_ms: u64,
}

/// Unit of work; the only level that carries raw activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leaf {
    pub id: EntityId,
    pub mid_id: EntityId,
    pub updated_date: DateTime<Utc>,
    #[serde(default)]
    pub activity: Vec<ActivityEvent>,
}

/// Container of leaves, optionally owned by a top.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mid {
    pub id: EntityId,
    #[serde(default)]
    pub top_id: Option<EntityId>,
    pub updated_date: DateTime<Utc>,
}

/// Container of mids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Top {
    pub id: EntityId,
    pub updated_date: DateTime<Utc>,
}

impl Leaf {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::leaf(self.id)
    }
}

impl Mid {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::mid(self.id)
    }

    /// The entity that owns the whole subtree this mid belongs to.
    pub fn root(&self) -> EntityRef {
        match self.top_id {
            Some(top_id) => EntityRef::top(top_id),
            None => self.entity_ref(),
        }
    }
}

impl Top {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::top(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ref_display_and_parse() {
        let r = EntityRef::mid(42);
        assert_eq!(r.to_string(), "mid:42");
        assert_eq!("mid:42".parse::<EntityRef>().unwrap(), r);
        assert_eq!(" top : 7".parse::<EntityRef>().unwrap(), EntityRef::top(7));
    }

    #[test]
    fn entity_ref_parse_rejects_garbage() {
        assert!("mid".parse::<EntityRef>().is_err());
        assert!("job:1".parse::<EntityRef>().is_err());
        assert!("leaf:abc".parse::<EntityRef>().is_err());
    }

    #[test]
    fn mid_root_prefers_top() {
        let now = Utc::now();
        let standalone = Mid { id: 3, top_id: None, updated_date: now };
        let owned = Mid { id: 4, top_id: Some(9), updated_date: now };
        assert_eq!(standalone.root(), EntityRef::mid(3));
        assert_eq!(owned.root(), EntityRef::top(9));
    }

    #[test]
    fn entity_kind_serde_lowercase() {
        let json = serde_json::to_string(&EntityRef::leaf(1)).unwrap();
        assert_eq!(json, r#"{"kind":"leaf","id":1}"#);
    }
}
