//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the VIO sync core.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Sensor hardware clock, integer nanoseconds (`Timestamp = i64`)
//! - `frame_id` is a per-camera sequence number, used for ordering/diagnostics

mod error;
mod frame;
mod inertial;
mod packet;
mod pipeline_config;
mod pose;
mod source;
pub mod time;

pub use error::*;
pub use frame::*;
pub use inertial::*;
pub use packet::*;
pub use pipeline_config::*;
pub use pose::*;
pub use source::{FrameSource, InertialSource, PoseSource};
pub use time::Timestamp;
