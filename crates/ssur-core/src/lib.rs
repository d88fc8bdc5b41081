#![deny(missing_docs)]
#![doc = "Core data, error and randomness types shared by the SSUR sampler crates."]

pub mod data;
pub mod errors;
pub mod linalg;
pub mod rng;

pub use data::Dataset;
pub use errors::{ErrorInfo, SsurError};
pub use rng::{derive_substream_seed, time_seed, RngHandle, RngPool};
