//! Balancing engine: turns a state snapshot into a target executor.
//!
//! A request's [`Pipeline`] is rebuilt from a fresh snapshot every time by
//! [`build_pipeline`]. The pipeline is an ordered list of [`Tier`]s, each a
//! pure filter paired with an [`Algorithm`]; the first tier whose filter
//! leaves any candidate picks the target.
//!
//! | Addressing method | Tiers |
//! |---|---|
//! | `anycast-efficient` | warm runtime → low host usage → online → any |
//! | `anycast-fast` | online → any (always random) |
//! | `broadcast` | none; every online executor is a target |

pub mod addressing;
pub mod algorithm;
pub mod error;
pub mod pipeline;

pub use addressing::AddressingMethod;
pub use algorithm::{Algorithm, RoundRobin};
pub use error::BalancerError;
pub use pipeline::{
    BalancingOption, Filter, Pipeline, Selection, Tier, USAGE_CEILING, build_pipeline,
    order_options,
};
