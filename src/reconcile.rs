/// Unread reconciliation: raw API response -> normalized watches -> unread count
///
/// Everything here is synchronous and free of I/O.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::cell::Cell;

use crate::error::{Error, Result};
use crate::watch::Watch;

/// The shapes a watch list response can take
#[derive(Debug, Clone, PartialEq)]
pub enum RawWatches {
    /// `[ {...}, {...} ]`
    Sequence(Vec<Value>),
    /// `{ "watches": [ ... ] }`
    Wrapped(Vec<Value>),
    /// `{ "<uuid>": {...}, ... }`
    Mapping(Map<String, Value>),
    /// `null`
    Absent,
    /// Any other primitive
    Invalid { received_type: &'static str },
}

impl From<Value> for RawWatches {
    fn from(raw: Value) -> Self {
        match raw {
            Value::Array(items) => RawWatches::Sequence(items),
            // Key order is the server's order, so the map is never re-keyed here
            Value::Object(mut map) => match map.get_mut("watches") {
                Some(Value::Array(items)) => RawWatches::Wrapped(std::mem::take(items)),
                _ => RawWatches::Mapping(map),
            },
            Value::Null => RawWatches::Absent,
            Value::String(_) => RawWatches::Invalid { received_type: "string" },
            Value::Number(_) => RawWatches::Invalid { received_type: "number" },
            Value::Bool(_) => RawWatches::Invalid { received_type: "boolean" },
        }
    }
}

impl RawWatches {
    pub fn into_watches(self) -> Result<Vec<Watch>> {
        match self {
            RawWatches::Sequence(items) | RawWatches::Wrapped(items) => Ok(items
                .into_iter()
                .map(|item| Watch::from_value(item, None))
                .collect()),
            RawWatches::Mapping(map) => Ok(map
                .into_iter()
                .map(|(key, item)| Watch::from_value(item, Some(&key)))
                .collect()),
            RawWatches::Absent => Ok(Vec::new()),
            RawWatches::Invalid { received_type } => Err(Error::InvalidFormat { received_type }),
        }
    }
}

/// Turn any response body into an ordered list of watches
pub fn normalize(raw: Value) -> Result<Vec<Watch>> {
    RawWatches::from(raw).into_watches()
}

/// Rule deciding whether a watch counts as unread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnreadPolicy {
    /// Server supplies `viewed`; only an explicit `false` is unread
    #[default]
    ViewedFlag,
    /// Legacy servers: compare `last_changed` against `last_viewed`
    Timestamps,
}

impl UnreadPolicy {
    pub fn is_unread(self, watch: &Watch) -> bool {
        match self {
            UnreadPolicy::ViewedFlag => watch.viewed == Some(false),
            UnreadPolicy::Timestamps => {
                let Some(changed) = &watch.last_changed else {
                    return false;
                };
                let Some(viewed) = &watch.last_viewed else {
                    return true;
                };
                // Unparsable dates never compare, matching an invalid Date
                match (viewed.to_datetime(), changed.to_datetime()) {
                    (Some(viewed), Some(changed)) => viewed <= changed,
                    _ => false,
                }
            }
        }
    }

    /// Pick the policy a response supports, if it carries any unread signal
    pub fn detect(watches: &[Watch]) -> Option<UnreadPolicy> {
        if watches.iter().any(|w| w.viewed.is_some()) {
            Some(UnreadPolicy::ViewedFlag)
        } else if watches.iter().any(|w| w.last_changed.is_some()) {
            Some(UnreadPolicy::Timestamps)
        } else {
            None
        }
    }
}

/// Number of unread watches in `watches`
pub fn count_unread(watches: &[Watch], policy: UnreadPolicy) -> usize {
    watches.iter().filter(|w| policy.is_unread(w)).count()
}

/// How a running instance settles on its policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySelection {
    Fixed(UnreadPolicy),
    /// Latch whatever the first response with an unread signal supports
    FromFirstResponse,
}

impl Default for PolicySelection {
    fn default() -> Self {
        PolicySelection::Fixed(UnreadPolicy::ViewedFlag)
    }
}

/// Applies one policy consistently for the lifetime of the instance
#[derive(Debug, Default)]
pub struct Reconciler {
    selection: PolicySelection,
    latched: Cell<Option<UnreadPolicy>>,
}

impl Reconciler {
    pub fn new(selection: PolicySelection) -> Self {
        Reconciler {
            selection,
            latched: Cell::new(None),
        }
    }

    /// The policy for this response. Once latched it never changes.
    pub fn policy_for(&self, watches: &[Watch]) -> UnreadPolicy {
        match self.selection {
            PolicySelection::Fixed(policy) => policy,
            PolicySelection::FromFirstResponse => {
                if let Some(policy) = self.latched.get() {
                    return policy;
                }
                match UnreadPolicy::detect(watches) {
                    Some(policy) => {
                        log::info!("Using {:?} unread policy", policy);
                        self.latched.set(Some(policy));
                        policy
                    }
                    None => UnreadPolicy::default(),
                }
            }
        }
    }

    pub fn count_unread(&self, watches: &[Watch]) -> usize {
        count_unread(watches, self.policy_for(watches))
    }

    pub fn classify(&self, watches: Vec<Watch>) -> Vec<ClassifiedWatch> {
        let policy = self.policy_for(&watches);
        watches
            .into_iter()
            .map(|watch| ClassifiedWatch {
                unread: policy.is_unread(&watch),
                watch,
            })
            .collect()
    }
}

/// A watch paired with the background's unread verdict, as sent to the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedWatch {
    #[serde(flatten)]
    pub watch: Watch,
    pub unread: bool,
}

impl<'de> Deserialize<'de> for ClassifiedWatch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut value = Value::deserialize(deserializer)?;
        let unread = value
            .as_object_mut()
            .and_then(|fields| fields.remove("unread"))
            .and_then(|flag| flag.as_bool())
            .unwrap_or(false);

        Ok(ClassifiedWatch {
            watch: Watch::from_value(value, None),
            unread,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn watches(raw: Value) -> Vec<Watch> {
        normalize(raw).unwrap()
    }

    #[test]
    fn test_normalize_sequence() {
        let list = watches(json!([{ "uuid": "1" }, { "uuid": "2" }, {}]));

        assert_eq!(list.len(), 3);
        assert_eq!(list[0].uuid.as_deref(), Some("1"));
        assert_eq!(list[2].uuid, None);
    }

    #[test]
    fn test_normalize_wrapper() {
        let list = watches(json!({ "watches": [{ "uuid": "a" }, { "uuid": "b" }] }));

        assert_eq!(list.len(), 2);
        assert_eq!(list[1].uuid.as_deref(), Some("b"));
    }

    #[test]
    fn test_normalize_mapping_injects_keys() {
        let list = watches(json!({
            "u-1": { "url": "https://a", "viewed": true },
            "u-2": { "uuid": "explicit", "url": "https://b" }
        }));

        assert_eq!(list.len(), 2);
        let ids: Vec<_> = list.iter().filter_map(|w| w.uuid.clone()).collect();
        assert!(ids.contains(&"u-1".to_string()));
        assert!(ids.contains(&"explicit".to_string()));
    }

    #[test]
    fn test_normalize_mapping_keeps_server_order() {
        let raw: Value = serde_json::from_str(
            r#"{"zz":{"title":"first"},"watches":{"title":"middle"},"aa":{"title":"last"}}"#,
        )
        .unwrap();

        let ids: Vec<_> = normalize(raw)
            .unwrap()
            .into_iter()
            .filter_map(|w| w.uuid)
            .collect();

        assert_eq!(ids, vec!["zz", "watches", "aa"]);
    }

    #[test]
    fn test_watches_key_that_is_not_a_list_is_an_id() {
        let list = watches(json!({ "watches": { "url": "https://a" } }));

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].uuid.as_deref(), Some("watches"));
    }

    #[test]
    fn test_normalize_null_and_empty() {
        assert!(watches(Value::Null).is_empty());
        assert!(watches(json!([])).is_empty());
        assert!(watches(json!({})).is_empty());
    }

    #[test]
    fn test_normalize_rejects_primitives() {
        for (raw, expected) in [
            (json!("watches"), "string"),
            (json!(12), "number"),
            (json!(true), "boolean"),
        ] {
            match normalize(raw) {
                Err(Error::InvalidFormat { received_type }) => assert_eq!(received_type, expected),
                other => panic!("expected InvalidFormat, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_viewed_flag_policy() {
        let policy = UnreadPolicy::ViewedFlag;

        assert!(policy.is_unread(&Watch::from_value(json!({ "viewed": false }), None)));
        assert!(!policy.is_unread(&Watch::from_value(json!({ "viewed": true }), None)));
        assert!(!policy.is_unread(&Watch::from_value(json!({}), None)));
    }

    #[test]
    fn test_timestamp_policy() {
        let policy = UnreadPolicy::Timestamps;
        let unread = |raw: Value| policy.is_unread(&Watch::from_value(raw, None));

        assert!(unread(json!({
            "last_changed": "2023-01-02T00:00:00Z",
            "last_viewed": "2023-01-01T00:00:00Z"
        })));
        assert!(unread(json!({
            "last_changed": "2023-01-01T00:00:00Z",
            "last_viewed": "2023-01-01T00:00:00Z"
        })));
        assert!(!unread(json!({
            "last_changed": "2023-01-01T00:00:00Z",
            "last_viewed": "2023-01-02T00:00:00Z"
        })));
        assert!(!unread(json!({ "last_viewed": "2023-01-02T00:00:00Z" })));
        assert!(unread(json!({ "last_changed": "2023-01-01T00:00:00Z", "last_viewed": null })));
        assert!(unread(json!({ "last_changed": 1672531200 })));
    }

    #[test]
    fn test_timestamp_policy_mixes_formats() {
        let watch = Watch::from_value(
            json!({ "last_changed": "2023-01-02T00:00:00Z", "last_viewed": 1672531200 }),
            None,
        );

        assert!(UnreadPolicy::Timestamps.is_unread(&watch));
    }

    #[test]
    fn test_count_unread_timestamp_scenario() {
        let list = watches(json!([
            { "uuid": "1", "last_changed": "2023-01-02T00:00:00Z", "last_viewed": "2023-01-01T00:00:00Z" },
            { "uuid": "2", "last_changed": "2023-01-01T00:00:00Z", "last_viewed": "2023-01-02T00:00:00Z" },
            { "uuid": "3", "last_changed": "2023-01-01T00:00:00Z", "last_viewed": null }
        ]));

        assert_eq!(count_unread(&list, UnreadPolicy::Timestamps), 2);
    }

    #[test]
    fn test_count_unread_is_idempotent() {
        let list = watches(json!([{ "viewed": false }, { "viewed": true }, { "viewed": false }]));
        let before = list.clone();

        assert_eq!(count_unread(&list, UnreadPolicy::ViewedFlag), 2);
        assert_eq!(count_unread(&list, UnreadPolicy::ViewedFlag), 2);
        assert_eq!(list, before);
    }

    #[test]
    fn test_detect_prefers_viewed_flag() {
        let both = watches(json!([{ "viewed": true, "last_changed": 10 }]));
        let legacy = watches(json!([{ "last_changed": 10 }]));
        let bare = watches(json!([{ "uuid": "x" }]));

        assert_eq!(UnreadPolicy::detect(&both), Some(UnreadPolicy::ViewedFlag));
        assert_eq!(UnreadPolicy::detect(&legacy), Some(UnreadPolicy::Timestamps));
        assert_eq!(UnreadPolicy::detect(&bare), None);
    }

    #[test]
    fn test_reconciler_latches_first_detected_policy() {
        let reconciler = Reconciler::new(PolicySelection::FromFirstResponse);
        let legacy = watches(json!([{ "last_changed": 10 }]));
        let modern = watches(json!([{ "viewed": false, "last_changed": 10, "last_viewed": 20 }]));

        assert_eq!(reconciler.policy_for(&[]), UnreadPolicy::ViewedFlag);
        assert_eq!(reconciler.count_unread(&legacy), 1);
        // Still timestamps: the latest view is after the change
        assert_eq!(reconciler.count_unread(&modern), 0);
    }

    #[test]
    fn test_fixed_reconciler_ignores_shape() {
        let reconciler = Reconciler::new(PolicySelection::Fixed(UnreadPolicy::ViewedFlag));
        let legacy = watches(json!([{ "last_changed": 10 }]));

        assert_eq!(reconciler.count_unread(&legacy), 0);
    }

    #[test]
    fn test_classified_watch_round_trip() {
        let reconciler = Reconciler::default();
        let classified = reconciler.classify(watches(json!([{ "uuid": "1", "viewed": false }])));
        let json = serde_json::to_value(&classified).unwrap();

        assert_eq!(json, json!([{ "uuid": "1", "viewed": false, "unread": true }]));

        let back: Vec<ClassifiedWatch> = serde_json::from_value(json).unwrap();
        assert_eq!(back, classified);
    }
}
