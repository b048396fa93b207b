//! synadiag-dummy - In-memory touch controller emulators for testing
//!
//! This crate provides transports that behave like real controllers without
//! any hardware:
//!
//! - [`DummyRegisters`]: a flat, side-effect free register file
//! - [`DummyRmi`]: an RMI device with F01, F12, F1A, F34, F54 and F55,
//!   self-clearing command registers and scripted F54 reports
//! - [`DummyTcm`]: a TCM packet responder with identify, app/boot info,
//!   static/touch config, production tests, dynamic config and flash
//!
//! Delays are virtual: every emulator counts the milliseconds it was asked
//! to sleep and returns at once.

pub mod registers;
pub mod rmi;
pub mod tcm;

pub use registers::DummyRegisters;
pub use rmi::{DummyFinger, DummyRmi, DummyRmiConfig};
pub use tcm::{DummyTcm, DummyTcmConfig, DummyTouch};
