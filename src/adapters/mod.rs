pub mod email;
pub mod persistence;
