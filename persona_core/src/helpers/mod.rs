pub mod dto;
pub mod utils;
