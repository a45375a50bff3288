//! Permission-gated catalog authorization.
//!
//! This crate provides principals with profile attributes, roles carrying
//! `(resource type, action)` permissions, the membership graph between them,
//! and a deny-by-default [`Gate`] that decides every catalog operation.
//! Persistence is consumed through the async store traits in [`Store`].
//!
//! # Examples
//!
//! Seeding roles and authorizing with the in-memory store (enable `memory-store`):
//! ```no_run
//! use catalog_gate::{ActionKind, Bootstrap, GateBuilder, PrincipalId, ResourceType};
//! # #[cfg(feature = "memory-store")]
//! # {
//! use catalog_gate::MemoryStore;
//! # futures::executor::block_on(async {
//! let store = MemoryStore::new();
//! Bootstrap::library().run(&store).await.unwrap();
//! let gate = GateBuilder::new(store).build();
//! let book = ResourceType::try_from("Book").unwrap();
//! let principal = PrincipalId::new();
//! let _ = gate.authorize(Some(&principal), &book, ActionKind::View).await;
//! # });
//! # }
//! ```
//!
//! Denials are values, not errors. Handlers that must fail the request use
//! [`Decision::require`]:
//! ```
//! use catalog_gate::{Decision, DenyReason, Error};
//! let err = Decision::Deny(DenyReason::PermissionMissing).require().unwrap_err();
//! assert!(matches!(err, Error::Denied(DenyReason::PermissionMissing)));
//! ```
#![forbid(unsafe_code)]

mod book;
mod bootstrap;
mod catalog;
mod credential;
mod error;
mod gate;
mod membership;
mod permission;
mod principal;
mod role;
mod store;
mod types;

#[cfg(feature = "memory-store")]
mod memory_store;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::book::{BOOK_RESOURCE, Book, BookId, Books, DeleteConfirmation, NewBook};
pub use crate::bootstrap::{Bootstrap, BootstrapReport, RoleSeed};
pub use crate::catalog::PermissionCatalog;
pub use crate::credential::{Credential, CredentialHash, CredentialHasher};
pub use crate::error::{Error, Result, StoreError};
pub use crate::gate::{Decision, DenyReason, Gate, GateBuilder};
pub use crate::membership::MembershipGraph;
pub use crate::permission::{ActionKind, Permission};
pub use crate::principal::{
    Principal, Principals, Profile, ProfileAttrs, ProfileChanges, ProfileUpdate,
};
pub use crate::role::{Role, RoleRegistry};
pub use crate::store::{
    BookStore, MembershipStore, PermissionStore, PrincipalStore, RoleStore, Store,
};
pub use crate::types::{Email, Handle, PrincipalId, ResourceType, RoleName};

#[cfg(feature = "argon2")]
pub use crate::credential::Argon2Hasher;

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;
