//! Library half of the Cebu news relay; the binary in `main.rs` wires it up.
//!
//! The aggregation core lives in [`normalize`], [`similarity`],
//! [`aggregate`], [`freshness`] and [`state`]. Network-facing pieces
//! ([`fetch`], [`scrapers`], [`publish`]) sit behind the [`fetch::PageFetcher`]
//! and [`publish::Publisher`] traits so the pipeline can be exercised without
//! a network.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod freshness;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod publish;
pub mod scrapers;
pub mod similarity;
pub mod state;
pub mod utils;
