//! Backend implementations of the collaborator traits.
//!
//! Each backend is gated behind a feature flag.

#[cfg(feature = "http-backend")]
pub mod http;
