//! # Wire Codecs
//!
//! Text formats exchanged with the remote node and the uplink:
//!
//! - [`frame`] - sensor frame `T:..,H:..,P:..` encode plus lenient and strict decode
//! - [`location`] - location segment extracted from the modem and the outgoing message format
//! - [`scan`] - label/value and numeric-run extraction both of the above build on
//!
//! ```rust
//! use fieldrelay::codec::{decode_lenient, SensorReading};
//!
//! let reading = decode_lenient("T:21.50,H:55.30,P:1013.25").unwrap();
//! assert_eq!(reading, SensorReading::new(21.5, 55.3, 1013.25));
//! ```

pub mod frame;
pub mod location;
pub mod scan;

pub use frame::{decode_lenient, decode_strict, DecodeStrategy, SensorReading, SENTINEL};
pub use location::{outgoing_message, LocationFix, NO_FIX};
