pub mod inference;
pub mod reputation;
