//! Services layer for the app. Uses webgen_core domain logic to provide services for the
//! cli.
pub mod chat;
