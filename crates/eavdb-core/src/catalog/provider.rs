//! Attribute metadata providers.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::attribute::{AttributeDescriptor, AttributeSet};
use super::entity::EntityRef;
use crate::error::{Error, Result};

/// Source of truth for attribute storage metadata.
///
/// Implementations must be idempotent: loading overlapping code sets returns
/// consistent descriptors. Codes with no definition are simply absent from
/// the result.
pub trait AttributeProvider: Send + Sync {
    /// Load descriptors for `codes`, or for every attribute of the entity
    /// when `codes` is `None`.
    fn load_attributes(
        &self,
        entity: &EntityRef,
        codes: Option<&BTreeSet<String>>,
    ) -> Result<AttributeSet>;
}

/// In-memory attribute catalog.
#[derive(Debug, Default)]
pub struct MemoryAttributeProvider {
    entities: RwLock<HashMap<String, Vec<AttributeDescriptor>>>,
    loads: AtomicUsize,
}

impl MemoryAttributeProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type with no attributes yet.
    pub fn register_entity(&self, entity: &EntityRef) {
        self.entities.write().entry(entity.code.clone()).or_default();
    }

    /// Register an attribute, replacing any previous definition of the code.
    pub fn register(&self, entity: &EntityRef, descriptor: AttributeDescriptor) {
        let mut entities = self.entities.write();
        let attributes = entities.entry(entity.code.clone()).or_default();
        match attributes.iter_mut().find(|a| a.code() == descriptor.code()) {
            Some(existing) => *existing = descriptor,
            None => attributes.push(descriptor),
        }
    }

    /// Register an attribute (builder form).
    pub fn with_attribute(self, entity: &EntityRef, descriptor: AttributeDescriptor) -> Self {
        self.register(entity, descriptor);
        self
    }

    /// Number of `load_attributes` calls served so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl AttributeProvider for MemoryAttributeProvider {
    fn load_attributes(
        &self,
        entity: &EntityRef,
        codes: Option<&BTreeSet<String>>,
    ) -> Result<AttributeSet> {
        self.loads.fetch_add(1, Ordering::Relaxed);

        let entities = self.entities.read();
        let attributes = entities
            .get(&entity.code)
            .ok_or_else(|| Error::Metadata(format!("unknown entity type '{}'", entity.code)))?;

        let mut set = AttributeSet::new(entity.clone());
        for descriptor in attributes {
            if codes.map_or(true, |c| c.contains(descriptor.code())) {
                set.insert(descriptor.clone());
            }
        }
        Ok(set)
    }
}
