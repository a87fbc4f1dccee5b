//! Contact list segmentation — static and dynamic lists over a CRM contact
//! pool, criteria evaluation, membership rows and cached list sizes.

pub mod builder;
pub mod criteria;
pub mod evaluator;
pub mod list;
pub mod membership;
pub mod query;
pub mod refresh;
pub mod registry;
pub mod store;
pub mod sync;

pub use builder::ListBuilder;
pub use criteria::{Criteria, CriteriaInput};
pub use evaluator::{matches, to_store_query};
pub use list::{ContactList, ListId, ListInput, ListKind, ListPatch, ListType, PseudoList};
pub use membership::{ListMembership, MembershipMaterializer, MembershipStatus};
pub use query::{ContactQuery, Constraint, ContactField};
pub use registry::{ListRegistry, RecountReport};
pub use store::{ContactStore, InMemoryContactStore};
pub use sync::CountSynchronizer;
