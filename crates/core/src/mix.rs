//! Stack identity.
//!
//! Two items can share one stack exactly when their [`MixType`]s are equal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::id::{DefId, MixTypeId};

/// Identity tuple of "things that can stack together".
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MixType {
    /// Base definition of the item.
    pub def: DefId,
    /// Material variant the item is made from, if any.
    #[serde(default)]
    pub stuff: Option<DefId>,
    /// Definition of the packed thing when the item is a minified building.
    #[serde(default)]
    pub inner: Option<DefId>,
}

impl MixType {
    pub const fn new(def: DefId) -> Self {
        Self {
            def,
            stuff: None,
            inner: None,
        }
    }

    pub const fn with_stuff(mut self, stuff: DefId) -> Self {
        self.stuff = Some(stuff);
        self
    }

    pub const fn minified(mut self, inner: DefId) -> Self {
        self.inner = Some(inner);
        self
    }

    pub fn can_mix_with(&self, other: &MixType) -> bool {
        self == other
    }
}

/// Canonical, persistable numbering of the mix types seen so far.
///
/// Interning is append-only, so a [`MixTypeId`] stays valid for the lifetime
/// of the registry and across a save/restore round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<MixType>", into = "Vec<MixType>")]
pub struct MixTypeRegistry {
    types: Vec<MixType>,
    index: HashMap<MixType, MixTypeId>,
}

impl MixTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `mix`, allocating one on first sight.
    pub fn intern(&mut self, mix: MixType) -> MixTypeId {
        if let Some(id) = self.index.get(&mix) {
            return *id;
        }
        let id = MixTypeId::new(self.types.len() as u32);
        self.types.push(mix);
        self.index.insert(mix, id);
        id
    }

    pub fn id_of(&self, mix: &MixType) -> Option<MixTypeId> {
        self.index.get(mix).copied()
    }

    pub fn get(&self, id: MixTypeId) -> Option<MixType> {
        self.types.get(id.raw() as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl From<Vec<MixType>> for MixTypeRegistry {
    fn from(types: Vec<MixType>) -> Self {
        let mut registry = Self::new();
        for mix in types {
            registry.intern(mix);
        }
        registry
    }
}

impl From<MixTypeRegistry> for Vec<MixType> {
    fn from(registry: MixTypeRegistry) -> Self {
        registry.types
    }
}
