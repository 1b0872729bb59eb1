//! Block-construction helpers.
//!
//! Key custody and balance tracking belong to the wallet application; this
//! crate only turns intent (send this much there, receive that pending,
//! rotate the representative) into a correctly-typed, signed state block
//! with work attached for the right root.

pub mod builder;

pub use builder::{BlockBuilder, BuilderError};
