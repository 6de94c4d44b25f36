//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock or simulation adapters.  All tests run on the host with no
//! real hardware required.

mod adapter_flow_tests;
mod mock_hw;
mod relay_module_tests;
