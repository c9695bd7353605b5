//! JSON-RPC header client for the BNB source chain.

mod client;
pub use client::Client;

mod error;
pub use error::BnbClientError;
