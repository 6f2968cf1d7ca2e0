use crate::CompletionCallback;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;

/// A Mermaid configuration object.
///
/// This is a thin wrapper over a JSON object so that it can carry the full engine config (themes,
/// per-diagram sections, ...) while the bootstrapper only reads the handful of keys it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MermaidConfig(Value);

impl Default for MermaidConfig {
    fn default() -> Self {
        Self::empty_object()
    }
}

impl From<Value> for MermaidConfig {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl MermaidConfig {
    pub fn empty_object() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// The defaults the bootstrapper assumes when the engine has not been initialized.
    pub fn site_defaults() -> Self {
        Self(serde_json::json!({
            "startOnLoad": true,
            "deterministicIds": false,
        }))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn get_value(&self, dotted_path: &str) -> Option<&Value> {
        let mut cur = &self.0;
        for segment in dotted_path.split('.') {
            cur = cur.as_object()?.get(segment)?;
        }
        Some(cur)
    }

    pub fn get_str(&self, dotted_path: &str) -> Option<&str> {
        self.get_value(dotted_path)?.as_str()
    }

    pub fn get_bool(&self, dotted_path: &str) -> Option<bool> {
        self.get_value(dotted_path)?.as_bool()
    }

    /// Sets a dotted path, replacing any non-object value met on the way with an object.
    pub fn set_value(&mut self, dotted_path: &str, value: Value) {
        let mut segments: Vec<&str> = dotted_path.split('.').collect();
        let Some(leaf) = segments.pop() else {
            return;
        };
        let mut cur = object_mut(&mut self.0);
        for segment in segments {
            cur = object_mut(cur.entry(segment).or_insert(Value::Null));
        }
        cur.insert(leaf.to_string(), value);
    }

    pub fn deep_merge(&mut self, other: &Value) {
        merge_into(&mut self.0, other);
    }

    /// `startOnLoad`, when present and boolean.
    pub fn start_on_load(&self) -> Option<bool> {
        self.get_bool("startOnLoad")
    }

    pub fn deterministic_ids(&self) -> bool {
        self.get_bool("deterministicIds").unwrap_or(false)
    }

    /// `deterministicIDSeed` as a string. Numeric seeds use their decimal form.
    pub fn deterministic_id_seed(&self) -> Option<String> {
        match self.get_value("deterministicIDSeed")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

fn object_mut(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

/// Objects merge key by key; anything else in `incoming` replaces what is in `base`.
fn merge_into(base: &mut Value, incoming: &Value) {
    match (base, incoming) {
        (Value::Object(base), Value::Object(incoming)) => {
            for (key, value) in incoming {
                merge_into(base.entry(key.as_str()).or_insert(Value::Null), value);
            }
        }
        (base, incoming) => *base = incoming.clone(),
    }
}

/// The engine-owned configuration store the bootstrapper reads from.
///
/// Besides the site configuration it carries the default completion callback, which cannot live
/// in a JSON object. All access is through `&self`; no borrow outlives a method call.
pub struct ConfigStore {
    config: RefCell<MermaidConfig>,
    callback: RefCell<Option<CompletionCallback>>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self {
            config: RefCell::new(MermaidConfig::site_defaults()),
            callback: RefCell::new(None),
        }
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("config", &self.config.borrow())
            .field("callback", &self.callback.borrow().is_some())
            .finish()
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the current site configuration.
    pub fn get(&self) -> MermaidConfig {
        self.config.borrow().clone()
    }

    /// Deep-merges `partial` into the site configuration.
    pub fn update(&self, partial: &MermaidConfig) {
        self.config.borrow_mut().deep_merge(partial.as_value());
    }

    /// Resets to [`MermaidConfig::site_defaults`] and merges `config` on top.
    pub fn initialize(&self, config: &MermaidConfig) {
        let mut next = MermaidConfig::site_defaults();
        next.deep_merge(config.as_value());
        *self.config.borrow_mut() = next;
    }

    pub fn callback(&self) -> Option<CompletionCallback> {
        self.callback.borrow().clone()
    }

    pub fn set_callback(&self, callback: Option<CompletionCallback>) {
        *self.callback.borrow_mut() = callback;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::rc::Rc;

    #[test]
    fn typed_accessors_read_bootstrap_keys() {
        let cfg = MermaidConfig::from_value(json!({
            "startOnLoad": false,
            "deterministicIds": true,
            "deterministicIDSeed": 1234,
        }));
        assert_eq!(cfg.start_on_load(), Some(false));
        assert!(cfg.deterministic_ids());
        assert_eq!(cfg.deterministic_id_seed().as_deref(), Some("1234"));

        let empty = MermaidConfig::empty_object();
        assert_eq!(empty.start_on_load(), None);
        assert!(!empty.deterministic_ids());
        assert_eq!(empty.deterministic_id_seed(), None);
    }

    #[test]
    fn set_value_creates_intermediate_objects() {
        let mut cfg = MermaidConfig::from_value(json!("not an object"));
        cfg.set_value("flowchart.htmlLabels", json!(false));
        assert_eq!(cfg.as_value(), &json!({ "flowchart": { "htmlLabels": false } }));
        assert_eq!(cfg.get_bool("flowchart.htmlLabels"), Some(false));
    }

    #[test]
    fn store_update_merges_and_initialize_resets() {
        let store = ConfigStore::new();
        assert_eq!(store.get().start_on_load(), Some(true));

        store.update(&MermaidConfig::from_value(json!({
            "startOnLoad": false,
            "theme": "forest",
        })));
        assert_eq!(store.get().start_on_load(), Some(false));
        assert_eq!(store.get().get_str("theme"), Some("forest"));

        store.initialize(&MermaidConfig::from_value(json!({ "deterministicIds": true })));
        assert_eq!(store.get().start_on_load(), Some(true));
        assert_eq!(store.get().get_str("theme"), None);
        assert!(store.get().deterministic_ids());
    }

    #[test]
    fn store_holds_a_default_callback() {
        let store = ConfigStore::new();
        assert!(store.callback().is_none());
        let cb: CompletionCallback = Rc::new(|_id: &str| {});
        store.set_callback(Some(cb));
        assert!(store.callback().is_some());
    }
}
