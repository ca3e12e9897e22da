//! Domain model for the service endpoint synchronizer.
//!
//! Everything in this crate is synchronous and side-effect free: identities,
//! desired/observed member sets, the annotation schema that selects backends,
//! the extractor that turns an `Endpoints` object into desired state and the
//! diff engine that turns desired vs observed into a change set.

pub mod annotations;
pub mod diff;
pub mod error;
pub mod extract;
pub mod identity;
pub mod member;
pub mod state;

pub use annotations::{BackendSpec, DnsTarget, TargetGroupArn};
pub use diff::{ChangeSet, DiffMode, diff};
pub use error::AnnotationError;
pub use extract::{desired_state, extract};
pub use identity::{BackendKind, ResourceIdentity};
pub use member::{DesiredMember, HealthState, ObservedMember, member_key};
pub use state::DesiredState;
