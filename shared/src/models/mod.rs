//! Domain models for the Meadery inventory system

mod audit;
mod batch;
mod material;
mod notification;
mod order;
mod user;

pub use audit::*;
pub use batch::*;
pub use material::*;
pub use notification::*;
pub use order::*;
pub use user::*;
