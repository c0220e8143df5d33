//! Pure payload decoders, free of any hardware access.
pub mod dht;
