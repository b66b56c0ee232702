//! Shared test functionality.
//!
//! [`factories`] builds small modules with known lock/unlock layouts so unit tests of the
//! analyses and operators can reason about exact positions and distances.

pub(crate) mod factories;
