pub mod config;
pub mod logging;

pub mod catalog;
pub mod control;
pub mod fetcher;
pub mod governor;
pub mod job;
pub mod parts;
pub mod probe;
pub mod queue;
pub mod retry;
pub mod scheduler;
pub mod storage;
pub mod store;
pub mod url_model;
