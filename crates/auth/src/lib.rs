//! API authentication (C4), `spec.md` §4.4, grounded in the teacher's
//! bearer-token middleware (`crates/gateway/src/api/auth.rs`) generalized
//! to the two auth schemes the original service actually exposes: an
//! admin key (`admin-api/app/main.py`'s `verify_admin_token`) and a
//! per-user API key resolved against the database
//! (`verify_admin_token`'s sibling `get_current_user`).

pub mod admin;
pub mod user;

use sqlx::PgPool;

/// What the auth middleware needs from the application state, without
/// depending on the gateway crate's concrete `AppState` type.
pub trait AuthState: Clone + Send + Sync + 'static {
    fn admin_token_hash(&self) -> &[u8; 32];
    fn pool(&self) -> &PgPool;
}
