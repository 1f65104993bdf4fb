//! Barebones clients for the music catalogs omni draws from.
#![deny(missing_docs)]

mod client;
pub use client::*;

mod request;

pub mod deezer;
pub mod spotify;
pub mod youtube;
