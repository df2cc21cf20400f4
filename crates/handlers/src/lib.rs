//! Deterministic handlers that sit behind the tool gateway and the upload
//! trigger: order tools, catalog population and object-created events.
//!
//! The order and catalog handlers take a raw JSON event and answer with a
//! [`HandlerResponse`] (status code plus JSON body) instead of failing. The
//! upload trigger turns a notification into an orchestrator payload.

pub mod catalog_population;
pub mod order_tools;
pub mod response;
pub mod upload_events;

pub use response::HandlerResponse;
