pub mod calendar;
pub mod lookup;
pub mod schedule;
