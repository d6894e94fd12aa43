//! Mutable registry before the lock, immutable snapshot after it.

use std::sync::Arc;

use crate::collection::CollectionElement;
use crate::key::{CollectionShape, Key, Map};
use crate::producer::InstanceProducer;
use crate::registration::Registration;

use super::unregistered::UnregisteredTypeHook;
use super::Container;

pub(crate) struct CollectionEntry {
    key: Key,
    shape: CollectionShape,
    elements: Vec<CollectionElement>,
}

/// Registrations made so far. Single writer, dropped at the lock transition.
#[derive(Default)]
pub(crate) struct PendingRegistry {
    index: Map<Key, usize>,
    producers: Vec<Arc<InstanceProducer>>,
    collection_index: Map<Key, usize>,
    collections: Vec<CollectionEntry>,
    pub(crate) hooks: Vec<UnregisteredTypeHook>,
}

impl PendingRegistry {
    pub(crate) fn contains(&self, key: &Key) -> bool {
        self.index.contains_key(key)
    }

    /// Inserts a producer, replacing an earlier one for the same key in place.
    pub(crate) fn insert(&mut self, producer: Arc<InstanceProducer>) {
        let key = producer.key();
        match self.index.get(&key) {
            Some(&position) => self.producers[position] = producer,
            None => {
                self.index.insert(key, self.producers.len());
                self.producers.push(producer);
            }
        }
    }

    pub(crate) fn producers(&self) -> &[Arc<InstanceProducer>] {
        &self.producers
    }

    pub(crate) fn contains_collection(&self, key: &Key) -> bool {
        self.collection_index.contains_key(key)
    }

    pub(crate) fn replace_collection(&mut self, key: Key, shape: CollectionShape, elements: Vec<CollectionElement>) {
        let entry = CollectionEntry { key, shape, elements };
        match self.collection_index.get(&key) {
            Some(&position) => self.collections[position] = entry,
            None => {
                self.collection_index.insert(key, self.collections.len());
                self.collections.push(entry);
            }
        }
    }

    pub(crate) fn append_to_collection(&mut self, key: Key, shape: CollectionShape, element: CollectionElement) {
        match self.collection_index.get(&key) {
            Some(&position) => self.collections[position].elements.push(element),
            None => self.replace_collection(key, shape, vec![element]),
        }
    }
}

/// Immutable view of the registry captured at the lock transition.
pub(crate) struct Snapshot {
    index: Map<Key, Arc<InstanceProducer>>,
    ordered: Vec<Arc<InstanceProducer>>,
    collections: Map<Key, Arc<InstanceProducer>>,
    collection_order: Vec<Arc<InstanceProducer>>,
    pub(crate) hooks: Vec<UnregisteredTypeHook>,
}

impl Snapshot {
    pub(crate) fn capture(pending: PendingRegistry, container: &Container) -> Self {
        let ordered = pending.producers;
        let index = ordered.iter().map(|producer| (producer.key(), producer.clone())).collect();

        let collection_order: Vec<Arc<InstanceProducer>> = pending
            .collections
            .into_iter()
            .map(|entry| {
                let registration = Registration::collection(container, entry.key.type_info(), entry.shape, entry.elements);
                InstanceProducer::new(entry.key, registration, container)
            })
            .collect();
        let collections = collection_order
            .iter()
            .map(|producer| (producer.key(), producer.clone()))
            .collect();

        Self { index, ordered, collections, collection_order, hooks: pending.hooks }
    }

    pub(crate) fn find(&self, key: &Key) -> Option<Arc<InstanceProducer>> {
        self.index.get(key).or_else(|| self.collections.get(key)).cloned()
    }

    /// Registered producers in registration order, then registered collections.
    pub(crate) fn roots(&self) -> impl Iterator<Item = &Arc<InstanceProducer>> {
        self.ordered.iter().chain(self.collection_order.iter())
    }

    pub(crate) fn ordered(&self) -> &[Arc<InstanceProducer>] {
        &self.ordered
    }
}
