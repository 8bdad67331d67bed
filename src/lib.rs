pub mod auth;
pub mod availability;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod repo;
pub mod routes;
