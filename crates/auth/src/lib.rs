//! `pengadaan-auth` — authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage engines: it
//! holds the account model, the role enum, and JWT claim verification.

pub mod account;
pub mod actor;
pub mod claims;
pub mod jwt;
pub mod roles;

pub use account::{Account, AccountStatus, AccountStore, InMemoryAccountStore};
pub use actor::Actor;
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use roles::UserRole;
