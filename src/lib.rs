// Public library interface for iot-flasher
//
// This module exposes the selection engine, URL validation and the
// simulated flash runner as a library that can be used by both the CLI
// binary and embedders.

pub mod catalog;
pub mod device;
pub mod engine;
pub mod flasher;
pub mod models;
pub mod validation;
