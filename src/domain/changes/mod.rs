//! Resource change events, subscriptions to them, and the reconciliation
//! plan that turns a batch of changes into an update of a cached list.

mod change;
mod reconcile;
mod subscription;

pub use change::{
    fields_overlap, ChangeKind, ResourceChange, RESOURCE_CREATED, RESOURCE_DELETED,
    RESOURCE_UPDATED,
};
pub use reconcile::{apply_patch, plan_reconciliation, ReconcileOptions, ReconcilePlan};
pub use subscription::{ListenTo, ResourceInterest, UpdateInterest};
