//! Type definitions for the Guess Tunes client
//!
//! Identifiers for type safety, session state, and the JSON bodies exchanged
//! with the auth endpoints.

pub mod identifiers;
pub mod session;
pub mod wire;

pub use identifiers::AccessToken;
pub use session::{AuthStatus, AuthUser, Session};
pub use wire::{
    AuthGrantBody, ErrorDetail, ErrorList, ErrorPayload, LoginRequest, RefreshGrant,
    RegisterRequest,
};
