//! Feature-map plumbing: reshaping backbone output into per-location vectors,
//! random location sampling, and host <-> tensor conversion.

pub mod bridge;
pub mod sampler;
