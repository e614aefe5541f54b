//! Proactive conversation dispatch.
//!
//! Resolves who a message is for, decides whether an existing Teams
//! conversation can be resumed or a new one must be created, sends, and
//! remembers newly created conversations so the next send resumes them.
//!
//! All collaborators (table store, connector) are injected; nothing here
//! holds global state.

pub mod cache;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod notify;
pub mod router;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use {
    cache::{ReferenceCache, RosterEntry},
    context::TurnContext,
    dispatch::{
        DispatchEngine, DispatchOutcome, DispatchPath, DispatchSettings, DispatchTarget, Scope,
    },
    error::{Error, Result},
    handlers::build_router,
    identity::{IdentityKey, IdentityResolver, IdentitySource},
    notify::{NotificationService, NotificationTargets},
    router::{ActivityHandler, ActivityRouter},
};
