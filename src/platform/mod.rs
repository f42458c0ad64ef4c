//! Strigo platform integration.
//!
//! This module provides the remote entity types, the [`RemoteApi`]
//! capability used by the reconciler and its HTTP implementation.

mod api;
mod client;
mod types;

pub use api::RemoteApi;
pub use client::{StrigoClient, DEFAULT_ENDPOINT};
pub use types::{
    Class, ClassRequest, Note, Owner, Presentation, Resource, ResourceRequest, ViewInterface,
    WebviewLink,
};
