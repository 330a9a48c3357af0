//! # Craft Payment Server
//! This module hosts the HTTP surface of the Craft payment gateway. It is responsible for:
//! Listening for incoming webhook requests from the payment provider.
//! Verifying the request signature before anything touches the payload.
//! Handing the verified event to the payment engine, and mapping the outcome to an HTTP status the provider's
//! retry logic understands.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhook/payment`: The webhook route for receiving signed payment events from the provider.

pub mod config;
pub mod data_objects;
pub mod errors;
pub mod notifications;
pub mod routes;
pub mod server;
pub mod signature;

#[cfg(test)]
mod endpoint_tests;
