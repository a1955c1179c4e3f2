pub mod availability;
pub mod duration;
pub mod schedule;
pub mod slots;
pub mod staff;
