//! Count synchronizer — derives a list's size from the authoritative source
//! for its type.

use std::sync::Arc;

use crm_core::SegmentationResult;
use tracing::debug;

use crate::evaluator::to_store_query;
use crate::list::{ListId, ListKind};
use crate::membership::MembershipMaterializer;
use crate::query::ContactQuery;
use crate::store::ContactStore;

pub struct CountSynchronizer {
    store: Arc<dyn ContactStore>,
    memberships: Arc<MembershipMaterializer>,
}

impl CountSynchronizer {
    pub fn new(store: Arc<dyn ContactStore>, memberships: Arc<MembershipMaterializer>) -> Self {
        Self { store, memberships }
    }

    /// Current size of a list: active membership rows for a static list,
    /// a store-side count of the criteria query for a dynamic one. Reads
    /// whatever state is persisted at call time.
    pub fn count(&self, list_id: ListId, kind: &ListKind) -> SegmentationResult<u64> {
        let count = match kind {
            ListKind::Static => self.memberships.active_count(list_id),
            ListKind::Dynamic { criteria } => {
                let query = to_store_query(ContactQuery::all(), criteria);
                self.store.count_contacts(&query)?
            }
        };
        debug!(list_id = %list_id, list_type = kind.list_type().as_str(), count, "computed list size");
        Ok(count)
    }

    /// Size of the whole contact store.
    pub fn count_all_contacts(&self) -> SegmentationResult<u64> {
        Ok(self.store.count_contacts(&ContactQuery::all())?)
    }
}
