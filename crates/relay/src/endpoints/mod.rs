//! # Relayエンドポイント

pub mod put;

pub use put::handle_put;
