pub mod account;
pub mod generate;
