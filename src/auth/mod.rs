//! Bearer-token authentication.
//!
//! Two token classes: short-lived access tokens presented on every protected
//! request, and refresh tokens accepted only by the rotation endpoint. Both are
//! checked against the blacklist before their signature, so a revoked token
//! stops working immediately rather than at expiry.

mod bearer;
mod errors;
mod extractors;
mod gate;
mod ip;
mod state;

pub use bearer::get_bearer_token;
pub use errors::{ApiAuthError, INVALID_TOKEN_MESSAGE, NEED_TOKEN_MESSAGE};
pub use extractors::{AccessAuth, RefreshAuth};
pub use gate::{AuthenticationGate, Identity, VerifiedRefresh};
pub use ip::extract_client_ip;
pub use state::HasAuthBackend;
