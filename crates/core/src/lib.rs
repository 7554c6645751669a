//! Shared value types for the xstep node-addressing core.
//!
//! This crate holds everything the node-set algebra and the axis evaluator
//! need to agree on without depending on each other: node and document
//! identifiers, the [`NodeIdAddressing`] contract (with the level-order
//! reference scheme), document sets and the document change notification
//! surface.

pub mod addressing;
pub mod document;
pub mod node;
pub mod update;

pub use addressing::{AddressingError, ChildRange, LevelOrderAddressing, NodeIdAddressing};
pub use document::{Document, DocumentRef, DocumentSet};
pub use node::{DocumentId, NodeId, NodeKind, QName};
pub use update::{ChangeNotifier, ListenerId, NotificationService, UpdateEvent, UpdateKind, UpdateListener};
