//! Typed translation tables and the declared-vs-existing delta.
//!
//! Every feature describes its keys as a [`FieldKey`] enum. Each key knows
//! its device tag, its caller-facing name and, for coded values, a static
//! [`ValueCodec`]. [`FieldMap::delta`] is the one place the "only touch
//! what differs" rule is implemented.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::error::FeatureError;

/// Static wire ↔ caller value table for a coded field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueCodec {
    /// `(wire, caller)` pairs.
    pairs: &'static [(&'static str, &'static str)],
}

impl ValueCodec {
    pub const fn new(pairs: &'static [(&'static str, &'static str)]) -> Self {
        Self { pairs }
    }

    /// Translates a device value into the caller vocabulary.
    pub fn to_caller(&self, wire: &str) -> Option<&'static str> {
        self.pairs.iter().find(|(w, _)| *w == wire).map(|(_, c)| *c)
    }

    /// Translates a caller value into the device vocabulary.
    pub fn to_wire(&self, caller: &str) -> Option<&'static str> {
        self.pairs.iter().find(|(_, c)| *c == caller).map(|(w, _)| *w)
    }

    /// Caller values accepted by this codec.
    pub fn accepted(&self) -> Vec<&'static str> {
        self.pairs.iter().map(|(_, c)| *c).collect()
    }
}

/// A key in a feature's translation table.
pub trait FieldKey: Copy + Ord + Debug + Send + Sync + 'static {
    /// Every key of the feature.
    const ALL: &'static [Self];

    /// Device-side tag.
    fn tag(self) -> &'static str;

    /// Caller-side name.
    fn name(self) -> &'static str;

    /// Value translation table, for coded fields.
    fn codec(self) -> Option<&'static ValueCodec> {
        None
    }

    /// Returns true for keys whose value is a set of items.
    fn is_list(self) -> bool {
        false
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.tag() == tag)
    }
}

/// A declared or existing value.
///
/// Lists compare as sets: order and duplicates are not a difference.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(s) => Some(s.as_str()),
            FieldValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(items) => Some(items.as_slice()),
            FieldValue::Scalar(_) => None,
        }
    }

    /// The list items as an ordered set.
    pub fn item_set(&self) -> BTreeSet<&str> {
        match self {
            FieldValue::List(items) => items.iter().map(String::as_str).collect(),
            FieldValue::Scalar(s) => std::iter::once(s.as_str()).collect(),
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Scalar(a), FieldValue::Scalar(b)) => a == b,
            (FieldValue::List(_), FieldValue::List(_)) => self.item_set() == other.item_set(),
            _ => false,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Scalar(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Scalar(s)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        FieldValue::List(items)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(items: Vec<&str>) -> Self {
        FieldValue::List(items.into_iter().map(str::to_string).collect())
    }
}

/// A key → value mapping for one feature instance.
///
/// Absent keys mean "unspecified", never "false" or "empty".
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMap<K: FieldKey> {
    entries: BTreeMap<K, FieldValue>,
}

impl<K: FieldKey> Default for FieldMap<K> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: FieldKey> FieldMap<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a declared map from caller names, validating coded values.
    pub fn from_pairs<I, N, V>(feature: &str, pairs: I) -> Result<Self, FeatureError>
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: Into<FieldValue>,
    {
        let mut map = Self::new();
        for (name, value) in pairs {
            let name = name.as_ref();
            let key = K::from_name(name).ok_or_else(|| FeatureError::UnknownKey {
                feature: feature.to_string(),
                key: name.to_string(),
            })?;
            map.try_insert(key, value.into())?;
        }
        Ok(map)
    }

    /// Reads existing state from the direct children of `node`.
    ///
    /// Device tags without a key are ignored; coded values are translated
    /// and values the codec does not know are kept verbatim.
    pub fn from_element(node: &Element) -> Self {
        let mut map = Self::new();
        for child in node.children() {
            let Some(key) = K::from_tag(child.local_name()) else {
                continue;
            };
            if key.is_list() {
                continue;
            }
            let raw = child.text().unwrap_or_default();
            let value = key
                .codec()
                .and_then(|codec| codec.to_caller(raw))
                .map_or_else(|| raw.to_string(), str::to_string);
            map.entries.insert(key, FieldValue::Scalar(value));
        }
        map
    }

    /// Inserts after checking the value against the key's codec and shape.
    pub fn try_insert(&mut self, key: K, value: FieldValue) -> Result<(), FeatureError> {
        if key.is_list() != matches!(value, FieldValue::List(_)) {
            return Err(FeatureError::invalid_value(
                key.name(),
                format!("{:?}", value),
                if key.is_list() {
                    "expected a list"
                } else {
                    "expected a single value"
                },
            ));
        }
        if let (Some(codec), FieldValue::Scalar(v)) = (key.codec(), &value) {
            if codec.to_wire(v).is_none() {
                return Err(FeatureError::invalid_value(
                    key.name(),
                    v.clone(),
                    format!("expected one of {:?}", codec.accepted()),
                ));
            }
        }
        self.entries.insert(key, value);
        Ok(())
    }

    /// Inserts without validation.
    pub fn insert(&mut self, key: K, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.entries.insert(key, value.into())
    }

    /// Builder form of [`FieldMap::insert`].
    pub fn with(mut self, key: K, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: K) -> Option<&FieldValue> {
        self.entries.get(&key)
    }

    pub fn get_scalar(&self, key: K) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_scalar)
    }

    pub fn get_list(&self, key: K) -> Option<&[String]> {
        self.get(key).and_then(FieldValue::as_list)
    }

    pub fn remove(&mut self, key: K) -> Option<FieldValue> {
        self.entries.remove(&key)
    }

    pub fn contains(&self, key: K) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Declared minus existing.
    ///
    /// Keeps every declared key whose value differs from (or is missing in)
    /// `existing`. Keys only present in `existing` are never included.
    pub fn delta(&self, existing: &Self) -> Self {
        let entries = self
            .entries
            .iter()
            .filter(|(k, v)| existing.entries.get(*k) != Some(*v))
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        Self { entries }
    }

    /// Device-side value for a scalar key.
    pub fn wire_value(&self, key: K) -> Option<String> {
        let value = self.get_scalar(key)?;
        Some(
            key.codec()
                .and_then(|codec| codec.to_wire(value))
                .map_or_else(|| value.to_string(), str::to_string),
        )
    }

    /// Leaf elements for every scalar entry, in key order.
    pub fn to_elements(&self) -> Vec<Element> {
        self.entries
            .keys()
            .filter(|k| !k.is_list())
            .filter_map(|k| self.wire_value(*k).map(|v| Element::leaf(k.tag(), v)))
            .collect()
    }

    /// Caller-facing view keyed by caller names.
    pub fn to_named(&self) -> BTreeMap<&'static str, FieldValue> {
        self.entries.iter().map(|(k, v)| (k.name(), v.clone())).collect()
    }
}
