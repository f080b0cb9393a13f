pub mod combine;
pub mod command;
pub mod discover;
pub mod fileformat;
pub mod resolve;
pub mod runtime;
pub mod utils;
