pub mod cache;
pub mod filter;
pub mod models;
pub mod remote;
pub mod seed;
pub mod service;
