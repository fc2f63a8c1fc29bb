pub mod account;
pub mod spotted;
