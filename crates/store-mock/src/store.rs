use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use xstep_core::{
    ChangeNotifier, Document, DocumentId, DocumentRef, DocumentSet, LevelOrderAddressing, ListenerId, NodeId,
    NodeKind, NotificationService, QName, UpdateEvent, UpdateListener,
};
use xstep_xpath::{
    DEFAULT_PART_CAPACITY, ElementIndex, IndexError, IndexedKind, NodeProxy, NodeSelector, NodeSet, NodeSource,
    StepServices, StorageAddress, select_candidate,
};

use crate::spec::{DocumentSpec, MockStoreError, NodeSpec, SpecKind};

#[derive(Debug)]
struct StoredNode {
    kind: NodeKind,
    name: Option<QName>,
    value: Option<String>,
}

#[derive(Debug)]
struct StoredDocument {
    doc: DocumentRef,
    nodes: BTreeMap<NodeId, StoredNode>,
    /// Identifiers in document order.
    order: Vec<NodeId>,
}

impl StoredDocument {
    fn build(id: DocumentId, spec: &DocumentSpec) -> Result<Self, MockStoreError> {
        let mut fan_out = Vec::new();
        measure(&spec.root, 0, &mut fan_out);
        let addressing = LevelOrderAddressing::new(&fan_out)?;
        let doc = Document::new(id, spec.uri.as_str(), Arc::new(addressing));
        let mut stored = Self { doc, nodes: BTreeMap::new(), order: Vec::new() };
        stored.place(&spec.root, NodeId::ROOT);
        Ok(stored)
    }

    fn place(&mut self, spec: &NodeSpec, id: NodeId) {
        self.nodes.insert(
            id,
            StoredNode { kind: kind_of(spec.kind), name: spec.name.as_deref().map(QName::local), value: spec.value.clone() },
        );
        self.order.push(id);
        if spec.slot_count() == 0 {
            return;
        }
        let Some(range) = self.doc.child_range(id) else {
            return;
        };
        for (slot, child) in (range.start.raw()..).zip(spec.attributes.iter().chain(&spec.children)) {
            self.place(child, NodeId(slot));
        }
    }

    fn proxy(&self, id: NodeId, node: &StoredNode) -> NodeProxy {
        NodeProxy::new(self.doc.clone(), id, node.kind).with_address(StorageAddress(id.raw()))
    }
}

/// Widest slot count per level, attributes and children together.
fn measure(spec: &NodeSpec, level: usize, fan_out: &mut Vec<u64>) {
    let slots = spec.slot_count() as u64;
    if slots > 0 {
        if fan_out.len() <= level {
            fan_out.resize(level + 1, 1);
        }
        fan_out[level] = fan_out[level].max(slots);
    }
    for child in spec.attributes.iter().chain(&spec.children) {
        measure(child, level + 1, fan_out);
    }
}

fn kind_of(kind: SpecKind) -> NodeKind {
    match kind {
        SpecKind::Element => NodeKind::Element,
        SpecKind::Attribute => NodeKind::Attribute,
        SpecKind::Text => NodeKind::Text,
        SpecKind::Comment => NodeKind::Comment,
        SpecKind::ProcessingInstruction => NodeKind::ProcessingInstruction,
    }
}

/// In-memory store that numbers nodes with level-order addressing.
///
/// Every mutation is reported through the store's [`NotificationService`]:
/// adding a document as [`UpdateEvent::added`], replacing or removing one
/// as [`UpdateEvent::other`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<DocumentId, Arc<StoredDocument>>>,
    next_id: AtomicU32,
    notifications: NotificationService,
    lookups: AtomicUsize,
    fail_next: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<DocumentId, Arc<StoredDocument>>> {
        self.documents.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<DocumentId, Arc<StoredDocument>>> {
        self.documents.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn stored(&self, id: DocumentId) -> Option<Arc<StoredDocument>> {
        self.read().get(&id).cloned()
    }

    /// Stores a new document and announces it.
    pub fn add_document(&self, spec: DocumentSpec) -> Result<DocumentRef, MockStoreError> {
        let id = DocumentId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let stored = StoredDocument::build(id, &spec)?;
        let doc = stored.doc.clone();
        tracing::debug!(document = %id, uri = spec.uri(), nodes = stored.order.len(), "document added");
        self.write().insert(id, Arc::new(stored));
        self.notifications.notify(UpdateEvent::added(id));
        Ok(doc)
    }

    /// Replaces the content of an existing document, keeping its identifier.
    ///
    /// Returns `Ok(None)` when no such document is stored.
    pub fn replace_document(&self, id: DocumentId, spec: DocumentSpec) -> Result<Option<DocumentRef>, MockStoreError> {
        let stored = StoredDocument::build(id, &spec)?;
        let doc = stored.doc.clone();
        {
            let mut documents = self.write();
            let Some(slot) = documents.get_mut(&id) else {
                return Ok(None);
            };
            *slot = Arc::new(stored);
        }
        tracing::debug!(document = %id, uri = spec.uri(), "document replaced");
        self.notifications.notify(UpdateEvent::other(id));
        Ok(Some(doc))
    }

    /// Reports a modification without changing content.
    pub fn touch_document(&self, id: DocumentId) -> bool {
        if !self.read().contains_key(&id) {
            return false;
        }
        self.notifications.notify(UpdateEvent::other(id));
        true
    }

    pub fn remove_document(&self, id: DocumentId) -> bool {
        let removed = self.write().remove(&id).is_some();
        if removed {
            tracing::debug!(document = %id, "document removed");
            self.notifications.notify(UpdateEvent::other(id));
        }
        removed
    }

    pub fn document(&self, id: DocumentId) -> Option<DocumentRef> {
        self.stored(id).map(|stored| stored.doc.clone())
    }

    pub fn documents(&self) -> DocumentSet {
        self.read().values().map(|stored| stored.doc.clone()).collect()
    }

    pub fn node(&self, doc: DocumentId, id: NodeId) -> Option<NodeProxy> {
        let stored = self.stored(doc)?;
        let node = stored.nodes.get(&id)?;
        Some(stored.proxy(id, node))
    }

    /// Nodes named `name` (elements and attributes) in document order.
    pub fn nodes_named(&self, doc: DocumentId, name: &str) -> Vec<NodeProxy> {
        let Some(stored) = self.stored(doc) else {
            return Vec::new();
        };
        let name = QName::local(name);
        stored
            .order
            .iter()
            .filter_map(|id| stored.nodes.get(id).map(|node| (*id, node)))
            .filter(|(_, node)| node.name.as_ref() == Some(&name))
            .map(|(id, node)| stored.proxy(id, node))
            .collect()
    }

    pub fn name(&self, doc: DocumentId, id: NodeId) -> Option<QName> {
        self.stored(doc)?.nodes.get(&id)?.name.clone()
    }

    /// Attribute value or character data of a node.
    pub fn value(&self, doc: DocumentId, id: NodeId) -> Option<String> {
        self.stored(doc)?.nodes.get(&id)?.value.clone()
    }

    /// Number of index scans served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Makes the next index scan fail with an I/O error.
    pub fn fail_next_lookup(&self) {
        self.fail_next.store(true, Ordering::Relaxed);
    }

    pub fn listener_count(&self) -> usize {
        self.notifications.listener_count()
    }

    /// Collaborators for building location steps against this store.
    pub fn services(self: &Arc<Self>) -> StepServices {
        StepServices::new(self.clone(), self.clone(), self.clone())
    }
}

impl ElementIndex for MemoryStore {
    fn find_elements_by_tag_name(
        &self,
        kind: IndexedKind,
        docs: &DocumentSet,
        name: &QName,
        selector: Option<&NodeSelector<'_>>,
    ) -> Result<NodeSet, IndexError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if self.fail_next.swap(false, Ordering::Relaxed) {
            return Err(IndexError::io("find_elements_by_tag_name", "injected failure"));
        }
        let wanted = match kind {
            IndexedKind::Element => NodeKind::Element,
            IndexedKind::Attribute => NodeKind::Attribute,
        };
        let mut result = NodeSet::with_capacity(docs.len(), DEFAULT_PART_CAPACITY);
        for doc in docs.iter() {
            let Some(stored) = self.stored(doc.id()) else {
                tracing::trace!(document = %doc.id(), "index scan skips unknown document");
                continue;
            };
            for id in &stored.order {
                let Some(node) = stored.nodes.get(id) else { continue };
                if node.kind != wanted || node.name.as_ref() != Some(name) {
                    continue;
                }
                if let Some(hit) = select_candidate(stored.proxy(*id, node), selector) {
                    result.add(hit);
                }
            }
        }
        tracing::trace!(%name, ?kind, hits = result.raw_len(), "index scan");
        Ok(result)
    }
}

impl NodeSource for MemoryStore {
    fn node_kind(&self, doc: &Document, id: NodeId) -> Option<NodeKind> {
        self.stored(doc.id())?.nodes.get(&id).map(|node| node.kind)
    }
}

impl ChangeNotifier for MemoryStore {
    fn subscribe(&self, listener: Arc<dyn UpdateListener>) -> ListenerId {
        self.notifications.subscribe(listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.notifications.unsubscribe(id)
    }
}
