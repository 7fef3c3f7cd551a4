//! Bearer-token authentication.
//!
//! Two layers run in order on every request: the request gate verifies an
//! optional `Authorization: Bearer` credential and attaches an
//! [`AuthenticatedIdentity`] on success, then the access policy decides from
//! the route table whether the request may proceed. The gate never rejects;
//! the policy is the only place a 401 comes from.

mod gate;
mod identity;
mod policy;

pub use gate::{
    BEARER_PREFIX, DEFAULT_LOOKUP_TIMEOUT, GateOutcome, PassReason, RequestGate, bearer_token,
    request_gate,
};
pub use identity::{Authenticated, AuthenticatedIdentity};
pub use policy::{
    AccessPolicy, AccessRule, Decision, Requirement, UnauthorizedAccess, enforce_access_policy,
};
