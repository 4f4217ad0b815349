//! Access token lifecycle
//!
//! Two building blocks shared by the client and the session:
//!
//! - [`TokenStore`]: the in-memory slot holding the current access token.
//!   Nothing is persisted; the long-lived refresh credential stays in a
//!   cookie the client never reads.
//! - [`RefreshCoordinator`]: collapses concurrent refresh needs into a single
//!   refresh call whose outcome every waiter shares.
//!
//! # Example
//!
//! ```
//! use guess_tunes_client::auth::TokenStore;
//! use guess_tunes_client::types::AccessToken;
//!
//! let tokens = TokenStore::new();
//! tokens.set(Some(AccessToken::new("abc")));
//! assert!(tokens.is_present());
//! tokens.clear();
//! assert!(tokens.get().is_none());
//! ```

mod refresh;
mod token;

pub use refresh::RefreshCoordinator;
pub use token::TokenStore;
