pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod gate;
pub mod routes;
pub mod service;
pub mod state;
pub mod watchlist;

pub use error::{AppError, Result};
