//! # Settlement server
//!
//! The HTTP face of the settlement reconciliation subsystem. It is responsible for:
//! * Listening for incoming webhook notifications from the payment gateways (PayPal, Cryptomus,
//!   Fawaterk and ONE), verifying their authenticity and handing the normalized events to the
//!   settlement engine.
//! * Polling the fulfilment providers for order status on a schedule and applying the results
//!   through the order state synchronizer.
//!
//! The HTTP status code of a webhook response is the retry-control contract with the gateways:
//! any 2xx stops redelivery, anything else invites it. See [`errors::ServerError`] for the mapping.
//!
//! ## Configuration
//! The server is configured via `SPG_*` environment variables. See [config](config/index.html).
//!
//! ## Routes
//! * `/health`: liveness check, returns 200.
//! * `/webhook/{paypal,cryptomus,fawaterk,one}`: per-gateway webhook receivers.
//! * `/sync`: manually trigger one synchronizer run and return the report.

pub mod adapters;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod providers;
pub mod routes;
pub mod server;
pub mod status_worker;

#[cfg(test)]
mod endpoint_tests;
