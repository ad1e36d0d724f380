//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises one subsystem against
//! the simulated device and the mock adapters in `mock_ports`.  Nothing
//! here needs a Bluetooth adapter or a network.

mod mock_ports;
mod session_flow_tests;
mod upload_tests;
mod workflow_tests;
