pub mod config;
pub mod data;
pub mod db;
pub mod error;
pub mod seed;
pub mod service;

pub use error::{Error, Result};
