//! Deterministic job keys for automatic recomputes.
//!
//! A key is `update-analytics-report-{kind}-{id}-{slot}` where the slot is
//! either `initial` or the scheduled time in unix milliseconds. Two callers
//! that agree on (entity, slot) produce the same key, which is what lets the
//! queue collapse concurrent schedules.

use analytics_core::EntityRef;
use chrono::{DateTime, Utc};

pub(crate) const KEY_PREFIX: &str = "update-analytics-report-";
const INITIAL_SLOT: &str = "initial";

/// Decoded slot of a key. `Initial` orders before every timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeySlot {
    Initial,
    At(DateTime<Utc>),
}

/// Common prefix of every key belonging to `entity`.
pub fn entity_prefix(entity: EntityRef) -> String {
    format!("{KEY_PREFIX}{}-{}-", entity.kind, entity.id)
}

/// Key of the very first recompute of `entity`.
pub fn initial_key(entity: EntityRef) -> String {
    format!("{}{INITIAL_SLOT}", entity_prefix(entity))
}

/// Key of the recompute of `entity` scheduled at `at` (millisecond precision).
pub fn regular_key(entity: EntityRef, at: DateTime<Utc>) -> String {
    format!("{}{}", entity_prefix(entity), at.timestamp_millis())
}

/// Decode the slot of `key` if it belongs to `entity`.
pub fn decode_slot(entity: EntityRef, key: &str) -> Option<KeySlot> {
    let slot = key.strip_prefix(&entity_prefix(entity))?;
    if slot == INITIAL_SLOT {
        return Some(KeySlot::Initial);
    }
    let millis: i64 = slot.parse().ok()?;
    DateTime::<Utc>::from_timestamp_millis(millis).map(KeySlot::At)
}

/// The pending key of `entity` with the latest slot.
pub fn latest_pending<'a, I>(entity: EntityRef, keys: I) -> Option<(&'a str, KeySlot)>
where
    I: IntoIterator<Item = &'a String>,
{
    keys.into_iter()
        .filter_map(|key| decode_slot(entity, key).map(|slot| (key.as_str(), slot)))
        .max_by_key(|(_, slot)| *slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_shapes() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(initial_key(EntityRef::mid(5)), "update-analytics-report-mid-5-initial");
        assert_eq!(
            regular_key(EntityRef::top(9), at),
            "update-analytics-report-top-9-1700000000123"
        );
    }

    #[test]
    fn decode_roundtrips_and_rejects_foreign_keys() {
        let entity = EntityRef::mid(1);
        let at = Utc.timestamp_millis_opt(1_000).unwrap();
        assert_eq!(decode_slot(entity, &regular_key(entity, at)), Some(KeySlot::At(at)));
        assert_eq!(decode_slot(entity, &initial_key(entity)), Some(KeySlot::Initial));

        // mid-1 must not match mid-12 or top-1.
        assert_eq!(decode_slot(entity, &initial_key(EntityRef::mid(12))), None);
        assert_eq!(decode_slot(entity, &initial_key(EntityRef::top(1))), None);
        assert_eq!(decode_slot(entity, "update-analytics-report-mid-1-garbage"), None);
    }

    #[test]
    fn initial_sorts_first() {
        let at = Utc.timestamp_millis_opt(0).unwrap();
        assert!(KeySlot::Initial < KeySlot::At(at));
    }

    #[test]
    fn latest_pending_picks_max_slot_of_entity() {
        let entity = EntityRef::top(3);
        let t1 = Utc.timestamp_millis_opt(10_000).unwrap();
        let t2 = Utc.timestamp_millis_opt(20_000).unwrap();
        let keys = vec![
            initial_key(entity),
            regular_key(entity, t1),
            regular_key(EntityRef::top(4), t2),
        ];
        let (key, slot) = latest_pending(entity, &keys).unwrap();
        assert_eq!(key, regular_key(entity, t1));
        assert_eq!(slot, KeySlot::At(t1));
        assert!(latest_pending(EntityRef::mid(3), &keys).is_none());
    }
}
