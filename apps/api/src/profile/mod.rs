// Profile API: store, normalizer, service, and HTTP handlers.
// All engine calls go through engine_client; nothing here speaks HTTP outbound.

pub mod handlers;
pub mod normalize;
pub mod service;
pub mod store;
