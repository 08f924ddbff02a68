// crates/pipeline-drivers/src/tests.rs
// ============================================================================
// Module: Drivers Test Lint Configuration
// Description: Shared test-only lint relaxations for driver unit tests.
// Purpose: Allow panic-based assertions and debug output in tests.
// Dependencies: pipeline-drivers
// ============================================================================

//! ## Overview
//! Provides test-only lint relaxations for driver unit tests.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]
