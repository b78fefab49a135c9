//! `Map`/`Set` serde adapters realizing the cross-implementation container
//! tagging protocol, so a `dict`/`set` payload round-trips distinguishably
//! from a plain JSON object or array: `{"__t":"M","d":[[k,v], ...]}` for
//! maps, `{"__t":"S","d":[v, ...]}` for sets. Relying on serde_json's
//! native map/array representation instead would make a tagged map
//! indistinguishable from an ordinary object once serialized.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::Error as DeError;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A map that serializes as `{"__t":"M","d":[[k,v], ...]}` rather than a
/// plain JSON object. `BTreeMap`-backed so key order (and therefore the
/// encoded `d` array) is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaggedMap<K: Ord, V>(pub BTreeMap<K, V>);

impl<K: Ord, V> TaggedMap<K, V> {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn into_inner(self) -> BTreeMap<K, V> {
        self.0
    }
}

#[derive(Deserialize)]
struct TaggedRepr<T> {
    __t: String,
    d: T,
}

impl<K, V> Serialize for TaggedMap<K, V>
where
    K: Ord + Serialize,
    V: Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let pairs: Vec<(&K, &V)> = self.0.iter().collect();
        let mut state = serializer.serialize_struct("TaggedMap", 2)?;
        state.serialize_field("__t", "M")?;
        state.serialize_field("d", &pairs)?;
        state.end()
    }
}

impl<'de, K, V> Deserialize<'de> for TaggedMap<K, V>
where
    K: Ord + Deserialize<'de>,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = TaggedRepr::<Vec<(K, V)>>::deserialize(deserializer)?;
        if repr.__t != "M" {
            return Err(DeError::custom(format!("expected tagged map marker \"M\", found {:?}", repr.__t)));
        }
        Ok(TaggedMap(repr.d.into_iter().collect()))
    }
}

/// A set that serializes as `{"__t":"S","d":[v, ...]}` rather than a plain
/// JSON array. `BTreeSet`-backed for deterministic ordering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaggedSet<T: Ord>(pub BTreeSet<T>);

impl<T: Ord> TaggedSet<T> {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn into_inner(self) -> BTreeSet<T> {
        self.0
    }
}

impl<T> Serialize for TaggedSet<T>
where
    T: Ord + Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let items: Vec<&T> = self.0.iter().collect();
        let mut state = serializer.serialize_struct("TaggedSet", 2)?;
        state.serialize_field("__t", "S")?;
        state.serialize_field("d", &items)?;
        state.end()
    }
}

impl<'de, T> Deserialize<'de> for TaggedSet<T>
where
    T: Ord + Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = TaggedRepr::<Vec<T>>::deserialize(deserializer)?;
        if repr.__t != "S" {
            return Err(DeError::custom(format!("expected tagged set marker \"S\", found {:?}", repr.__t)));
        }
        Ok(TaggedSet(repr.d.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_round_trips_through_the_tagged_shape() {
        let mut map = TaggedMap::new();
        map.0.insert("a".to_string(), 1);
        map.0.insert("b".to_string(), 2);

        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["__t"], "M");
        assert_eq!(json["d"], serde_json::json!([["a", 1], ["b", 2]]));

        let restored: TaggedMap<String, i32> = serde_json::from_value(json).unwrap();
        assert_eq!(restored, map);
    }

    #[test]
    fn set_round_trips_through_the_tagged_shape() {
        let mut set = TaggedSet::new();
        set.0.insert(3);
        set.0.insert(1);
        set.0.insert(2);

        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["__t"], "S");
        assert_eq!(json["d"], serde_json::json!([1, 2, 3]));

        let restored: TaggedSet<i32> = serde_json::from_value(json).unwrap();
        assert_eq!(restored, set);
    }

    #[test]
    fn deserializing_a_plain_object_is_rejected() {
        let plain = serde_json::json!({"a": 1});
        let result: Result<TaggedMap<String, i32>, _> = serde_json::from_value(plain);
        assert!(result.is_err());
    }

    #[test]
    fn deserializing_wrong_marker_is_rejected() {
        let wrong = serde_json::json!({"__t": "S", "d": [["a", 1]]});
        let result: Result<TaggedMap<String, i32>, _> = serde_json::from_value(wrong);
        assert!(result.is_err());
    }
}
