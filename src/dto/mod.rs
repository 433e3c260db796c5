pub mod disputes;
pub mod orders;
