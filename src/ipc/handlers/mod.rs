pub mod academics;
pub mod catalog;
pub mod core;
pub mod crud;
pub mod fees;
pub mod people;
pub mod session;
