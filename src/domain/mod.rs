pub mod booking;
pub mod course;
pub mod enrollment;
pub mod payment;
pub mod purchase_order;
pub mod schedule;

pub use booking::*;
pub use course::*;
pub use enrollment::*;
pub use payment::*;
pub use purchase_order::*;
pub use schedule::*;
