//! `medlem-auth` — roles, permissions and account primitives.
//!
//! This crate is intentionally decoupled from HTTP and storage. Everything in
//! here is deterministic: the role lattice, the permission projection, claims
//! window validation and credential hashing take no ambient state.

pub mod authorize;
pub mod claims;
pub mod credentials;
pub mod permissions;
pub mod roles;
pub mod user;

pub use authorize::{authorize, AuthzError, Capability};
pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use credentials::{hash_password, verify_password, CredentialError, TemporaryPassword};
pub use permissions::PermissionSet;
pub use roles::Role;
pub use user::{NewUser, User};
