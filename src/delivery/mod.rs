//! Delivery Client: outbound HTTP POST of notifications to LDN inboxes.

mod client;
mod http;

pub use client::{DeliveryClient, DeliveryError};
pub use http::HttpDeliveryClient;
