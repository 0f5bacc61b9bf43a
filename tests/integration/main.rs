//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host (x86_64) with no
//! real hardware required.

// Host critical-section implementation backing the engine's inbound channel.
use critical_section as _;

mod engine_tests;
mod service_tests;
