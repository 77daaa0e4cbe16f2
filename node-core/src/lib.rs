#![no_std]

// Shared logic for the light/battery sensor node.
//
// The crate avoids the Rust standard library so the same scheduler,
// acquisition state machine and report formatting run on the MCU firmware and
// inside the host-side emulator and tests.

pub mod acquisition;
pub mod average;
pub mod config;
pub mod node;
pub mod report;
pub mod scheduler;
pub mod telemetry;
