//! Closed-form orbit evaluation.

pub mod orbits;
