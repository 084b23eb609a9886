//! WebAssembly bindings.
//!
//! Enable with the `wasm` feature:
//!
//! ```toml
//! [dependencies]
//! lww-dict = { version = "0.1", features = ["wasm"] }
//! ```
//!
//! Exposes a string-to-string dictionary as a JavaScript class. Each replica
//! stamps its writes with a hybrid logical clock fed by `Date.now()`, so
//! replicas created with distinct node ids never produce equal timestamps.

use wasm_bindgen::prelude::*;

use crate::clock::HybridClock;
use crate::Crdt;

fn js_time_ms() -> u64 {
    js_sys::Date::now() as u64
}

// ── LWWDictionary ───────────────────────────────────────────────────

/// A last-writer-wins dictionary of strings for use from JavaScript.
#[wasm_bindgen(js_name = LWWDictionary)]
pub struct WasmLWWDictionary {
    inner: crate::LWWDictionary<String, String, HybridClock>,
}

#[wasm_bindgen(js_class = LWWDictionary)]
impl WasmLWWDictionary {
    /// Create an empty replica. `node_id` must differ between replicas.
    #[wasm_bindgen(constructor)]
    pub fn new(node_id: u16) -> Self {
        Self {
            inner: crate::LWWDictionary::new(HybridClock::with_time_source(node_id, js_time_ms)),
        }
    }

    /// Set `key` to `value`.
    pub fn add(&mut self, key: &str, value: &str) {
        self.inner.add(key.to_string(), value.to_string());
    }

    /// Remove `key`. Returns `true` if a removal was recorded.
    pub fn remove(&mut self, key: &str) -> bool {
        self.inner.remove(key)
    }

    /// Get the value for `key`, or `undefined`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    /// Check whether `key` is present.
    pub fn has(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Number of present keys.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if no key is present.
    #[wasm_bindgen(js_name = isEmpty)]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Merge another replica's state into this one.
    pub fn merge(&mut self, other: &WasmLWWDictionary) {
        self.inner.merge(&other.inner);
    }

    /// Get all present keys as a JavaScript array.
    pub fn keys(&self) -> Box<[JsValue]> {
        self.inner
            .keys()
            .map(|k| JsValue::from_str(k))
            .collect::<Vec<_>>()
            .into_boxed_slice()
    }

    /// Get all present entries as an array of `[key, value]` pairs.
    pub fn entries(&self) -> js_sys::Array {
        self.inner
            .iter()
            .map(|(k, v)| JsValue::from(js_sys::Array::of2(&JsValue::from_str(k), &JsValue::from_str(v))))
            .collect::<js_sys::Array>()
    }
}
