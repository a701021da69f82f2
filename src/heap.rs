//! Arena storage for heap-allocated runtime values (arrays and objects).
//!
//! Per the design notes: prefer arena ownership with explicit parent links
//! from objects to their prototypes, avoiding cycles. Mixins copy properties
//! at construction time rather than linking, so `ObjectData::prototypes` is
//! a record of provenance for introspection, not a chain that property
//! lookup walks at runtime.
//!
//! The whole arena is dropped with the VM; there is no GC and no slot
//! reuse. A single script execution never outlives the arena that backs it,
//! so this is the simplest ownership model that satisfies spec.md §5's
//! resource lifecycle ("freed transitively when that container is freed").

use indexmap::IndexMap;

use crate::value::Value;

/// Index into a [`Heap`] arena. Stable for the arena's lifetime: entries are
/// never removed or reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct HeapId(u32);

impl HeapId {
    #[must_use]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// An object's property map plus provenance of any mixins copied into it.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ObjectData {
    /// Insertion-ordered property map (spec.md invariant: "Object key
    /// iteration follows insertion order").
    pub properties: IndexMap<String, Value>,
    /// Heap ids of objects this object's literal listed as mixin sources,
    /// left to right. Recorded for introspection only.
    pub prototypes: Vec<HeapId>,
}

impl ObjectData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set(&mut self, key: String, value: Value) {
        self.properties.insert(key, value);
    }
}

/// The heap-allocated payload behind a [`HeapId`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum HeapData {
    Array(Vec<Value>),
    Object(ObjectData),
}

/// Monotonically growing arena of heap-allocated values.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct Heap {
    slots: Vec<HeapData>,
}

impl Heap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, data: HeapData) -> HeapId {
        let id = HeapId(u32::try_from(self.slots.len()).expect("heap arena overflow"));
        self.slots.push(data);
        id
    }

    pub fn alloc_array(&mut self, values: Vec<Value>) -> HeapId {
        self.alloc(HeapData::Array(values))
    }

    pub fn alloc_object(&mut self, data: ObjectData) -> HeapId {
        self.alloc(HeapData::Object(data))
    }

    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapData {
        &self.slots[id.index()]
    }

    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self.slots[id.index()]
    }

    #[must_use]
    pub fn array(&self, id: HeapId) -> Option<&Vec<Value>> {
        match self.get(id) {
            HeapData::Array(values) => Some(values),
            HeapData::Object(_) => None,
        }
    }

    pub fn array_mut(&mut self, id: HeapId) -> Option<&mut Vec<Value>> {
        match self.get_mut(id) {
            HeapData::Array(values) => Some(values),
            HeapData::Object(_) => None,
        }
    }

    #[must_use]
    pub fn object(&self, id: HeapId) -> Option<&ObjectData> {
        match self.get(id) {
            HeapData::Object(data) => Some(data),
            HeapData::Array(_) => None,
        }
    }

    pub fn object_mut(&mut self, id: HeapId) -> Option<&mut ObjectData> {
        match self.get_mut(id) {
            HeapData::Object(data) => Some(data),
            HeapData::Array(_) => None,
        }
    }

    /// Live object count, used by tests and embedding hosts for diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
