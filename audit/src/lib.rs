pub mod audit;
pub mod collector;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod recommend;
pub mod report;
pub mod risk;
pub mod snapshot;
pub mod trend;
