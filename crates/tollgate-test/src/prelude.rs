//! Everything a test usually needs.
//!
//! Use `use tollgate_test::prelude::*;`.

pub use crate::clock::*;
pub use crate::fixtures::*;
pub use crate::harness::*;
