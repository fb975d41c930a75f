pub mod plant;
pub mod reminder;
