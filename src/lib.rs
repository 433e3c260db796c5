pub mod clock;
pub mod config;
pub mod db;
pub mod dispute;
pub mod dto;
pub mod entity;
pub mod error;
pub mod escrow;
pub mod history;
pub mod machine;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod sweeper;
