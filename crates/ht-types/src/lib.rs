//! Shared types for the ht-monitor temperature and humidity server.
//!
//! This crate has no I/O. It holds the pieces both the store and the service
//! agree on:
//!
//! - The display window preset table ([`DataPeriod`])
//! - Device metadata ([`Device`])
//! - The ingestion payload posted by sensors ([`ReadingPayload`])
//! - Unit conversion and calibration ([`calibration`])

pub mod calibration;
pub mod error;
pub mod types;

pub use calibration::{Compensation, celsius_to_fahrenheit, pa_to_hpa};
pub use error::{ParseError, ParseResult};
pub use types::{DataPeriod, Device, ReadingPayload};
