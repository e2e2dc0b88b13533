/*
 * fxdesk - Currency Trading Desk
 * Core library exports and module declarations
 */

pub mod cli;
pub mod config;
pub mod currency;
pub mod models;
pub mod portfolio;
pub mod rates;
pub mod service;
pub mod sources;
pub mod storage;
pub mod users;
pub mod utils;

pub use config::Config;
pub use models::*;
pub use service::TradeService;
