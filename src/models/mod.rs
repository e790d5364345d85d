//! Data models for the DormHub rental management application.
//!
//! These models match the frontend TypeScript interfaces exactly for seamless interoperability.

mod amenity;
mod dorm;
mod invoice;
mod renter;
mod room;
mod subscription;

pub use amenity::*;
pub use dorm::*;
pub use invoice::*;
pub use renter::*;
pub use room::*;
pub use subscription::*;
