mod client;

pub use client::{HyperTransport, WebhookTransport};
