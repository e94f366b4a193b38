//! Identity store for bridged users and rooms.
//!
//! The store is the single source of truth for "who and what the bridge knows
//! about". It is composed of:
//!
//! - [`User`]: a Matrix user known to the bridge, with its remote identity and
//!   [`PermissionLevel`]
//! - [`Room`]: a Matrix room, bridged to a remote conversation or a shell
//! - [`IdentityStore`]: owner of both maps, with atomic get-or-create
//! - [`Permissions`]: permission levels granted to new users
//!
//! Records are handed out as clones. Collaborators keep identifiers and always
//! resolve through the store.

mod identity_store;
mod permissions;
mod room;
mod user;

pub use crate::store::{
    identity_store::{IdentityStore, Snapshot},
    permissions::Permissions,
    room::{GhostRef, Room},
    user::{PermissionLevel, User},
};
