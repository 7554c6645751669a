//! Node-set algebra and axis step evaluation.
//!
//! [`NodeSet`] stores node references partitioned by document and answers
//! structural questions (children, ancestors, siblings, document order)
//! purely from node identifiers. [`LocationStep`] evaluates one path step
//! over a [`NodeSet`], choosing between streaming, preloading and index
//! push-down, and caches its result until the input or the stored
//! documents change.

pub mod axis;
pub mod error;
pub mod node_proxy;
pub mod node_set;
pub mod selector;
pub mod step;
pub mod storage;

pub use axis::Axis;
pub use error::{IndexError, StepError};
pub use node_proxy::{ContextNode, NodeProxy, SingleNodeIter, StorageAddress};
pub use node_set::{DEFAULT_PART_CAPACITY, NodeSet, NodeSetIter, Part, Relation, SetIdentity, SiblingDirection};
pub use node_test::{NodeTest, TestKind};
pub use selector::{NodeSelector, Selection};
pub use step::{
    AxisResult, CachedResult, LocationStep, LocationStepBuilder, NodeFilter, Position, Predicate, StepServices,
    Strategy, Subscription, VirtualIter, VirtualNodeSet,
};
pub use storage::{ElementIndex, IndexedKind, NodeSource, select_candidate};

pub use xstep_core::{Document, DocumentId, DocumentRef, DocumentSet, NodeId, NodeKind, QName};
