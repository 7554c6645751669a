//! Deterministic in-memory document store for exercising xstep.
//!
//! [`MemoryStore`] numbers every document with [`LevelOrderAddressing`]
//! and serves the [`ElementIndex`], [`NodeSource`] and [`ChangeNotifier`]
//! contracts from memory. Documents are described with [`NodeSpec`]
//! builders or parsed from XML text.
//!
//! [`LevelOrderAddressing`]: xstep_core::LevelOrderAddressing
//! [`ElementIndex`]: xstep_xpath::ElementIndex
//! [`NodeSource`]: xstep_xpath::NodeSource
//! [`ChangeNotifier`]: xstep_core::ChangeNotifier

mod spec;
mod store;

pub use spec::{DocumentSpec, MockStoreError, NodeSpec, SpecKind};
pub use store::MemoryStore;
