//! Evaluation of one path step.
//!
//! A [`LocationStep`] turns an input [`NodeSet`] into the nodes reached over
//! its axis that pass its node test and predicates. Depending on the test
//! and on how the step is used it
//!
//! * streams wildcard results as a [`VirtualNodeSet`] or by walking storage,
//! * preloads every index hit for the name once per document set and joins
//!   it with each input through the [`NodeSet`] relationship algebra, or
//! * pushes a [`NodeSelector`] into the index scan.
//!
//! The raw result is cached against the identity and revision of the input
//! set. Cached and preloaded data is dropped when the store reports a
//! change to a document in scope; events arrive over a channel the step
//! drains before every evaluation.

mod cache;
mod listener;
mod predicate;
mod virtual_set;
mod walk;

use std::fmt;
use std::sync::Arc;

use xstep_core::{ChangeNotifier, DocumentSet, NodeId, NodeKind, QName, UpdateEvent, UpdateKind};

use crate::axis::Axis;
use crate::error::StepError;
use crate::node_proxy::NodeProxy;
use crate::node_set::{NodeSet, Relation, SiblingDirection, attach_context};
use crate::node_test::{NodeTest, TestKind};
use crate::selector::NodeSelector;
use crate::storage::{ElementIndex, IndexedKind, NodeSource};

pub use cache::CachedResult;
use listener::UpdateChannel;
pub use listener::Subscription;
pub use predicate::{NodeFilter, Position, Predicate};
pub use virtual_set::{VirtualIter, VirtualNodeSet};

/// Output of a step: materialised, or a lazy view over the input.
#[derive(Clone, Debug)]
pub enum AxisResult {
    Nodes(NodeSet),
    Virtual(VirtualNodeSet),
}

impl AxisResult {
    pub fn empty() -> Self {
        AxisResult::Nodes(NodeSet::new())
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, AxisResult::Virtual(_))
    }

    pub fn document_set(&self) -> DocumentSet {
        match self {
            AxisResult::Nodes(set) => set.document_set(),
            AxisResult::Virtual(set) => set.document_set(),
        }
    }

    /// Node count if known without walking storage.
    pub fn known_len(&self) -> Option<usize> {
        match self {
            AxisResult::Nodes(set) if set.is_sorted_by_id() || set.is_in_document_order() => Some(set.raw_len()),
            _ => None,
        }
    }

    pub fn into_node_set(self) -> NodeSet {
        match self {
            AxisResult::Nodes(set) => set,
            AxisResult::Virtual(set) => set.realize(),
        }
    }

    pub fn into_document_order(self) -> Vec<NodeProxy> {
        self.into_node_set().into_document_order()
    }
}

/// Storage collaborators a step evaluates against.
#[derive(Clone)]
pub struct StepServices {
    pub index: Arc<dyn ElementIndex>,
    pub source: Arc<dyn NodeSource>,
    pub notifier: Arc<dyn ChangeNotifier>,
}

impl StepServices {
    pub fn new(index: Arc<dyn ElementIndex>, source: Arc<dyn NodeSource>, notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self { index, source, notifier }
    }
}

impl fmt::Debug for StepServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepServices").finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Wildcard test: no index lookup.
    Streaming,
    /// Whole index result for the name, joined with the input.
    Preload,
    /// Index scan filtered by a structural selector.
    Pushdown,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Streaming => "streaming",
            Strategy::Preload => "preload",
            Strategy::Pushdown => "pushdown",
        }
    }
}

#[derive(Debug)]
struct Preloaded {
    docs: DocumentSet,
    nodes: NodeSet,
}

/// Axes for which a structural selector exists.
fn has_selector(axis: Axis) -> bool {
    matches!(
        axis,
        Axis::Child
            | Axis::Attribute
            | Axis::Descendant
            | Axis::DescendantOrSelf
            | Axis::DescendantAttribute
            | Axis::Ancestor
            | Axis::AncestorOrSelf
            | Axis::Parent
            | Axis::SelfAxis
    )
}

/// Axes that can only produce elements in this engine.
fn element_only(axis: Axis) -> bool {
    matches!(axis, Axis::SelfAxis | Axis::Parent | Axis::Ancestor | Axis::AncestorOrSelf)
}

#[derive(Debug)]
pub struct LocationStepBuilder {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Box<dyn Predicate>>,
    in_predicate: bool,
    in_update: bool,
    preload: bool,
    context_docs: Option<DocumentSet>,
}

impl LocationStepBuilder {
    pub fn with_predicate(mut self, predicate: impl Predicate + 'static) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// The step runs inside a predicate: results remember their context node.
    pub fn in_predicate(mut self, value: bool) -> Self {
        self.in_predicate = value;
        self
    }

    /// The step runs inside an update expression; preloading is disabled.
    pub fn in_update(mut self, value: bool) -> Self {
        self.in_update = value;
        self
    }

    /// The step is evaluated repeatedly against small inputs.
    pub fn preload(mut self, value: bool) -> Self {
        self.preload = value;
        self
    }

    /// Documents to search instead of the input's own documents.
    pub fn context_documents(mut self, docs: DocumentSet) -> Self {
        self.context_docs = Some(docs);
        self
    }

    pub fn build(self, services: StepServices) -> Result<LocationStep, StepError> {
        if self.axis == Axis::Namespace {
            return Err(StepError::UnsupportedAxis(self.axis));
        }
        Ok(LocationStep {
            axis: self.axis,
            test: self.test,
            predicates: self.predicates,
            in_predicate: self.in_predicate,
            in_update: self.in_update,
            preload: self.preload,
            context_docs: self.context_docs,
            services,
            preloaded: None,
            cached: None,
            updates: None,
        })
    }
}

pub struct LocationStep {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Box<dyn Predicate>>,
    in_predicate: bool,
    in_update: bool,
    preload: bool,
    context_docs: Option<DocumentSet>,
    services: StepServices,
    preloaded: Option<Preloaded>,
    cached: Option<CachedResult>,
    updates: Option<UpdateChannel>,
}

impl LocationStep {
    pub fn builder(axis: Axis, test: NodeTest) -> LocationStepBuilder {
        LocationStepBuilder {
            axis,
            test,
            predicates: Vec::new(),
            in_predicate: false,
            in_update: false,
            preload: false,
            context_docs: None,
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn test(&self) -> &NodeTest {
        &self.test
    }

    fn preload_enabled(&self) -> bool {
        self.preload && !self.in_update
    }

    fn remember_context(&self) -> bool {
        self.in_predicate || self.predicates.iter().any(|p| p.requires_context())
    }

    /// How the next evaluation will obtain its candidates.
    pub fn strategy(&self) -> Strategy {
        if self.test.is_wildcard() {
            Strategy::Streaming
        } else if self.preload_enabled() || !has_selector(self.axis) {
            Strategy::Preload
        } else {
            Strategy::Pushdown
        }
    }

    /// Evaluates the step for `input`, reusing the cached result while
    /// `input` is the same unchanged set.
    pub fn eval(&mut self, input: &mut NodeSet) -> Result<AxisResult, StepError> {
        // Listen before scanning so changes made during the scan are queued.
        self.ensure_subscribed();
        self.drain_updates();
        if let Some(cached) = &self.cached
            && cached.is_valid(input)
        {
            let result = cached.result().clone();
            tracing::debug!(axis = %self.axis, test = %self.test, "reusing cached step result");
            return self.apply_predicates(input, result);
        }

        let searched = self.search_documents(input);
        let (result, strategy) = self.compute(input, &searched)?;
        let result = deduplicate(result);
        self.cached = Some(CachedResult::new(input, result.clone(), &searched));

        let result = self.apply_predicates(input, result)?;
        tracing::trace!(
            axis = %self.axis,
            test = %self.test,
            strategy = strategy.as_str(),
            found = ?result.known_len(),
            "location step evaluated"
        );
        Ok(result)
    }

    /// Evaluates the step for a single context node. Nothing is cached.
    pub fn eval_item(&mut self, item: &NodeProxy) -> Result<AxisResult, StepError> {
        self.ensure_subscribed();
        self.drain_updates();
        let mut input: NodeSet = std::iter::once(item.clone()).collect();
        let searched = self.search_documents(&input);
        let (result, _) = self.compute(&mut input, &searched)?;
        self.apply_predicates(&input, deduplicate(result))
    }

    /// Drops cached and preloaded results.
    pub fn reset_state(&mut self) {
        self.preloaded = None;
        self.cached = None;
    }

    pub fn has_cached_result(&mut self) -> bool {
        self.drain_updates();
        self.cached.is_some()
    }

    pub fn has_preloaded(&mut self) -> bool {
        self.drain_updates();
        self.preloaded.is_some()
    }

    pub fn is_subscribed(&self) -> bool {
        self.updates.is_some()
    }

    fn ensure_subscribed(&mut self) {
        if self.updates.is_none() {
            self.updates = Some(UpdateChannel::open(&self.services.notifier));
        }
    }

    fn drain_updates(&mut self) {
        let events = match &self.updates {
            Some(channel) => channel.drain(),
            None => return,
        };
        for event in events {
            self.apply_update(event);
        }
    }

    fn apply_update(&mut self, event: UpdateEvent) {
        let (drop_preload, drop_cache) = match event.kind {
            UpdateKind::Added => (self.preloaded.is_some(), self.cached.is_some()),
            UpdateKind::Other => (
                self.preloaded.as_ref().is_some_and(|p| p.docs.contains(event.document)),
                self.cached.as_ref().is_some_and(|c| c.touches(event.document)),
            ),
        };
        if drop_preload {
            self.preloaded = None;
        }
        if drop_cache {
            self.cached = None;
        }
        if drop_preload || drop_cache {
            tracing::debug!(
                doc = %event.document,
                kind = ?event.kind,
                listener = ?self.updates.as_ref().map(UpdateChannel::listener_id),
                preload = drop_preload,
                cache = drop_cache,
                "document update invalidated step caches"
            );
        }
    }

    fn search_documents(&self, input: &NodeSet) -> DocumentSet {
        self.context_docs.clone().unwrap_or_else(|| input.document_set())
    }

    fn apply_predicates(&self, input: &NodeSet, result: AxisResult) -> Result<AxisResult, StepError> {
        if self.predicates.is_empty() {
            return Ok(result);
        }
        let mut set = result.into_node_set();
        for predicate in &self.predicates {
            set = predicate.filter(Some(input), set, self.axis)?;
        }
        Ok(AxisResult::Nodes(set))
    }

    fn compute(&mut self, input: &mut NodeSet, searched: &DocumentSet) -> Result<(AxisResult, Strategy), StepError> {
        if self.axis == Axis::Namespace {
            return Err(StepError::UnsupportedAxis(self.axis));
        }
        if element_only(self.axis) && !self.test.may_match_element() {
            return Ok((AxisResult::empty(), Strategy::Streaming));
        }
        let remember = self.remember_context();
        let Some(name) = self.test.name.clone() else {
            return Ok((self.stream(input, remember), Strategy::Streaming));
        };
        match self.strategy() {
            Strategy::Pushdown => Ok((AxisResult::Nodes(self.push_down(input, searched, &name, remember)?), Strategy::Pushdown)),
            _ => Ok((AxisResult::Nodes(self.preload_and_join(input, searched, &name, remember)?), Strategy::Preload)),
        }
    }

    fn index_kind(&self) -> IndexedKind {
        if self.axis.is_attribute_axis() || self.test.kind == TestKind::Attribute {
            IndexedKind::Attribute
        } else {
            IndexedKind::Element
        }
    }

    fn lookup(&self, docs: &DocumentSet, name: &QName, selector: Option<&NodeSelector<'_>>) -> Result<NodeSet, StepError> {
        let index = &self.services.index;
        let found = match self.index_kind() {
            IndexedKind::Attribute => index.attributes_by_name(docs, name, selector)?,
            IndexedKind::Element => index.find_elements_by_tag_name(IndexedKind::Element, docs, name, selector)?,
        };
        Ok(found)
    }

    fn push_down(
        &mut self,
        input: &mut NodeSet,
        searched: &DocumentSet,
        name: &QName,
        remember: bool,
    ) -> Result<NodeSet, StepError> {
        let selector = match self.axis {
            Axis::Child | Axis::Attribute => NodeSelector::child(input, remember),
            Axis::Descendant | Axis::DescendantAttribute => NodeSelector::descendant(input, remember),
            Axis::DescendantOrSelf => NodeSelector::descendant_or_self(input, remember),
            Axis::Ancestor => NodeSelector::ancestor(input, remember, false),
            Axis::AncestorOrSelf => NodeSelector::ancestor(input, remember, true),
            Axis::Parent => NodeSelector::parent(input, remember),
            Axis::SelfAxis => NodeSelector::self_node(input, remember),
            _ => return self.preload_and_join(input, searched, name, remember),
        };
        self.lookup(searched, name, Some(&selector))
    }

    fn preload_and_join(
        &mut self,
        input: &mut NodeSet,
        searched: &DocumentSet,
        name: &QName,
        remember: bool,
    ) -> Result<NodeSet, StepError> {
        let mut preloaded = match self.preloaded.take() {
            Some(preloaded) if preloaded.docs == *searched => preloaded,
            _ => {
                tracing::debug!(axis = %self.axis, test = %self.test, docs = searched.len(), "preloading index result");
                let nodes = self.lookup(searched, name, None)?;
                Preloaded { docs: searched.clone(), nodes }
            }
        };
        let nodes = &mut preloaded.nodes;
        let result = match self.axis {
            Axis::Child | Axis::Attribute => nodes.select_parent_child(input, Relation::Descendant, remember),
            Axis::Parent => nodes.select_parent_child(input, Relation::Ancestor, remember),
            Axis::Descendant | Axis::DescendantAttribute => {
                nodes.select_ancestor_descendant(input, Relation::Descendant, false, remember)
            }
            Axis::DescendantOrSelf => nodes.select_ancestor_descendant(input, Relation::Descendant, true, remember),
            Axis::Ancestor => nodes.select_ancestors(input, false, remember),
            Axis::AncestorOrSelf => nodes.select_ancestors(input, true, remember),
            Axis::SelfAxis => {
                let mut found = NodeSet::new();
                for node in input.nodes() {
                    if let Some(hit) = nodes.get(node.document_id(), node.id()) {
                        let mut hit = hit.clone();
                        attach_context(&mut hit, node, remember);
                        found.add(hit);
                    }
                }
                found
            }
            Axis::FollowingSibling => nodes.select_siblings(input, SiblingDirection::Following, remember),
            Axis::PrecedingSibling => nodes.select_siblings(input, SiblingDirection::Preceding, remember),
            Axis::Following => nodes.select_following(input, remember),
            Axis::Preceding => nodes.select_preceding(input, remember),
            Axis::Namespace => return Err(StepError::UnsupportedAxis(self.axis)),
        };
        self.preloaded = Some(preloaded);
        Ok(result)
    }

    /// Wildcard evaluation without the index.
    fn stream(&self, input: &NodeSet, remember: bool) -> AxisResult {
        let source = &self.services.source;
        match self.axis {
            Axis::Child | Axis::Attribute | Axis::Descendant | Axis::DescendantOrSelf | Axis::DescendantAttribute => {
                AxisResult::Virtual(VirtualNodeSet::new(self.axis, self.test.clone(), input, remember, Arc::clone(source)))
            }
            Axis::SelfAxis if self.test.kind == TestKind::Node => {
                let mut same = input.clone();
                if remember {
                    same.set_self_as_context();
                }
                AxisResult::Nodes(same)
            }
            Axis::SelfAxis => {
                AxisResult::Virtual(VirtualNodeSet::new(self.axis, self.test.clone(), input, remember, Arc::clone(source)))
            }
            Axis::Parent => AxisResult::Nodes(input.parents(remember)),
            Axis::Ancestor | Axis::AncestorOrSelf => AxisResult::Nodes(self.ancestors_by_arithmetic(input, remember)),
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                let direction = if self.axis == Axis::FollowingSibling {
                    SiblingDirection::Following
                } else {
                    SiblingDirection::Preceding
                };
                AxisResult::Nodes(self.collect_walked(input, remember, |node| {
                    if node.kind() == NodeKind::Attribute {
                        Vec::new()
                    } else {
                        walk::siblings(source.as_ref(), node.doc(), node.id(), direction)
                    }
                }))
            }
            Axis::Following => AxisResult::Nodes(self.collect_walked(input, remember, |node| {
                walk::beyond(source.as_ref(), node, SiblingDirection::Following)
            })),
            Axis::Preceding => AxisResult::Nodes(self.collect_walked(input, remember, |node| {
                walk::beyond(source.as_ref(), node, SiblingDirection::Preceding)
            })),
            Axis::Namespace => AxisResult::empty(),
        }
    }

    fn ancestors_by_arithmetic(&self, input: &NodeSet, remember: bool) -> NodeSet {
        let mut result = NodeSet::new();
        for node in input.nodes() {
            if self.axis == Axis::AncestorOrSelf && self.test.matches_kind(node.kind()) {
                let mut me = node.clone();
                if remember {
                    me.add_context_node(node.as_context());
                }
                result.add(me);
            }
            let doc = node.doc();
            let mut level = node.level();
            let mut id = node.id();
            while level > 0 {
                id = doc.parent_id(id, level);
                level -= 1;
                if id.is_none() {
                    break;
                }
                let mut ancestor = NodeProxy::element(doc.clone(), id);
                attach_context(&mut ancestor, node, remember);
                result.add(ancestor);
            }
        }
        result
    }

    fn collect_walked(
        &self,
        input: &NodeSet,
        remember: bool,
        visit: impl Fn(&NodeProxy) -> Vec<(NodeId, NodeKind)>,
    ) -> NodeSet {
        let mut result = NodeSet::new();
        for node in input.nodes() {
            for (id, kind) in visit(node) {
                if self.test.matches_kind(kind) {
                    let mut found = NodeProxy::new(node.doc().clone(), id, kind);
                    attach_context(&mut found, node, remember);
                    result.add(found);
                }
            }
        }
        result
    }
}

fn deduplicate(result: AxisResult) -> AxisResult {
    match result {
        AxisResult::Nodes(mut set) => {
            set.sort();
            AxisResult::Nodes(set)
        }
        virtual_set => virtual_set,
    }
}

impl fmt::Debug for LocationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationStep")
            .field("axis", &self.axis)
            .field("test", &self.test)
            .field("predicates", &self.predicates)
            .field("in_predicate", &self.in_predicate)
            .field("in_update", &self.in_update)
            .field("preload", &self.preload)
            .field("cached", &self.cached.is_some())
            .field("preloaded", &self.preloaded.is_some())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for LocationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.axis, self.test)
    }
}
