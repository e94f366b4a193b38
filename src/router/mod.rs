//! Event routing between Matrix and the remote network.
//!
//! Each inbound event goes through `Idle → Dispatching → Handling → Idle`.
//! See [`Connector`] for the lifecycle and [`Dispatch`] for the report every
//! handler returns.

mod connector;
mod dispatch;
mod login;
mod room_event;

pub use crate::router::{
    connector::{Collaborators, Connector},
    dispatch::{Actor, CallGuard, Dispatch, Step},
};
