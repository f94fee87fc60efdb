use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::value::FieldPath;

/// A nested request record produced by the [`Walker`](crate::Walker).
///
/// Thin wrapper over a JSON object that knows how to address fields by
/// [`FieldPath`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Block(Map<String, Json>);

impl Block {
    pub fn new() -> Self { Self::default() }

    /// Wrap a JSON object. Other JSON values are rejected.
    pub fn from_json(value: Json) -> Option<Self> {
        match value {
            Json::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Store `value` at `path`, creating intermediate objects as needed.
    /// Non-object intermediates are replaced.
    pub fn set(&mut self, path: &FieldPath, value: Json) {
        let Some((leaf, parents)) = path.segments().split_last() else {
            return;
        };
        let mut map = &mut self.0;
        for segment in parents {
            let entry = map
                .entry(segment.clone())
                .or_insert_with(|| Json::Object(Map::new()));
            if !entry.is_object() {
                *entry = Json::Object(Map::new());
            }
            let Json::Object(next) = entry else {
                return;
            };
            map = next;
        }
        map.insert(leaf.clone(), value);
    }

    /// Append `value` to the array at `path`. A missing, null or blank slot
    /// becomes a one-element array; a scalar slot is promoted to an array.
    pub fn push(&mut self, path: &FieldPath, value: Json) {
        match self.slot(path) {
            Some(Json::Array(items)) => items.push(value),
            Some(slot) if slot.is_null() || slot.as_str() == Some("") => *slot = Json::Array(vec![value]),
            Some(slot) => {
                let prev = slot.take();
                *slot = Json::Array(vec![prev, value]);
            }
            None => self.set(path, Json::Array(vec![value])),
        }
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Json> {
        let (first, rest) = path.segments().split_first()?;
        rest.iter()
            .try_fold(self.0.get(first)?, |node, segment| node.get(segment))
    }

    /// Mutable access to an existing slot. Never creates fields.
    pub fn slot(&mut self, path: &FieldPath) -> Option<&mut Json> {
        let (first, rest) = path.segments().split_first()?;
        let mut node = self.0.get_mut(first)?;
        for segment in rest {
            node = node.get_mut(segment)?;
        }
        Some(node)
    }

    pub fn contains(&self, path: &FieldPath) -> bool { self.get(path).is_some() }

    pub fn as_map(&self) -> &Map<String, Json> { &self.0 }

    pub fn into_json(self) -> Json { Json::Object(self.0) }
}

impl From<Map<String, Json>> for Block {
    fn from(map: Map<String, Json>) -> Self { Self(map) }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_set_creates_nested_objects() {
        let mut block = Block::new();
        block.set(&"time.start".into(), json!("20100101000000"));
        block.set(&"time.end".into(), json!("20100102000000"));
        block.set(&"instrument".into(), json!("eit"));
        assert_eq!(
            block.into_json(),
            json!({"time": {"start": "20100101000000", "end": "20100102000000"}, "instrument": "eit"})
        );
    }

    #[test]
    fn test_slot_does_not_create() {
        let mut block = Block::from_json(json!({"time": {"start": ""}})).unwrap();
        assert!(block.slot(&"time.near".into()).is_none());
        assert!(block.slot(&"time.start".into()).is_some());
        assert!(!block.contains(&"time.near".into()));
    }

    #[test]
    fn test_push_builds_arrays() {
        let mut block = Block::from_json(json!({"field": {"fielditem": ""}})).unwrap();
        let path = FieldPath::dotted("field.fielditem");
        block.push(&path, json!("a"));
        block.push(&path, json!("b"));
        assert_eq!(block.get(&path), Some(&json!(["a", "b"])));

        let mut fresh = Block::new();
        fresh.push(&path, json!("c"));
        assert_eq!(fresh.get(&path), Some(&json!(["c"])));
    }
}
