use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};

use super::buffer::Buffer;

/// Value stored per fingerprint
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Buffer(Buffer),
    /// Parent keys already covered by the buffer
    Keys(BTreeSet<i64>),
}

/// Request-scoped key/value store for relation buffers
///
/// One instance per query execution; not shared between executions.
pub trait ResolutionCache {
    fn get(&self, key: &str) -> Option<&CachedValue>;
    fn has(&self, key: &str) -> bool;
    fn set(&mut self, key: String, value: CachedValue);
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<String, CachedValue>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResolutionCache for MemoryCache {
    fn get(&self, key: &str) -> Option<&CachedValue> {
        self.entries.get(key)
    }

    fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn set(&mut self, key: String, value: CachedValue) {
        self.entries.insert(key, value);
    }
}

/// Deterministic identity of one relation resolution
///
/// Built from the relation's owner, field, resolver and the canonical text
/// of its order/filter arguments, then hashed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    digest: String,
    description: String,
}

impl Fingerprint {
    pub fn new(parts: &[(&str, &str)]) -> Self {
        let description = parts
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("|");

        let mut hasher = Sha256::new();
        hasher.update(description.as_bytes());
        let digest = hex::encode(hasher.finalize());

        Fingerprint {
            digest,
            description,
        }
    }

    pub fn buffer_key(&self) -> String {
        format!("{}:buffer", self.digest)
    }

    pub fn keys_key(&self) -> String {
        format!("{}:keys", self.digest)
    }

    /// Unhashed form, for logging
    pub fn description(&self) -> &str {
        &self.description
    }
}
