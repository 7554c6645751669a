use xstep_core::{DocumentId, DocumentSet};

use super::AxisResult;
use crate::node_set::{NodeSet, SetIdentity};

/// Raw step result together with the input it was computed from.
///
/// Valid only for the same input instance at the same revision.
#[derive(Clone, Debug)]
pub struct CachedResult {
    input: SetIdentity,
    revision: u32,
    result: AxisResult,
    documents: DocumentSet,
}

impl CachedResult {
    /// `searched` are the documents the step looked in; together with the
    /// result's own documents they form the scope used for invalidation.
    pub fn new(input: &NodeSet, result: AxisResult, searched: &DocumentSet) -> Self {
        let mut documents = result.document_set();
        documents.extend(searched.iter().cloned());
        Self { input: input.identity(), revision: input.revision(), result, documents }
    }

    pub fn is_valid(&self, input: &NodeSet) -> bool {
        self.input == input.identity() && self.revision == input.revision()
    }

    pub fn result(&self) -> &AxisResult {
        &self.result
    }

    /// True if a change to `doc` can affect this result.
    pub fn touches(&self, doc: DocumentId) -> bool {
        self.documents.contains(doc)
    }
}
