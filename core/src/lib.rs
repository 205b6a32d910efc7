//! Synchronous client core for REST resource collections.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern). The caller executes the
//! actual HTTP round-trip, making the core fully deterministic and testable.
//! On top of the client, `CollectionStore` keeps a local copy of one
//! collection and applies create/update/delete optimistically, rolling back
//! when the server refuses.
//!
//! # Design
//! - `ResourceClient` is stateless: it holds only the base URL and the
//!   resource path, so one type serves `/tasks`, `/posts` and any other
//!   collection the server registers.
//! - Each CRUD operation is split into `build_*` (produces request) and
//!   `parse_*` (consumes response), so the I/O boundary is explicit.
//! - The store follows the same split: `begin_*` returns a request with a
//!   ticket, `complete` reconciles the response. `Transport` is the optional
//!   convenience seam for hosts that execute requests synchronously.
//! - DTOs are defined independently from the server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod error;
pub mod http;
pub mod store;
pub mod transport;
pub mod types;

pub use client::ResourceClient;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use store::{
    CollectionStore, Entry, EntryKey, LoadState, Mode, Outcome, PendingRequest, PendingState,
    Ticket,
};
pub use transport::Transport;
pub use types::{ContentRange, ErrorBody, ErrorDetail, Fields, Item, ItemId, Page, PageRequest};
