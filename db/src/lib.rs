//! Collaborators of the MFA core: identity lookup, session storage and
//! password hashing, with in-process implementations.

pub mod hasher;
pub mod storage;

pub use hasher::{BcryptHasher, HashError, PasswordHasher};
pub use storage::{
    Condition, IdentityResolver, IdentityStore, MatchMode, MemoryStorage, SessionStore, Storage,
    StoreError,
};
