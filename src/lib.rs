// Library for tests to access modules

pub mod backfill;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod fitbit_client;
pub mod heart_repo;
pub mod models;
pub mod routes;
pub mod sync_worker;
pub mod version;
pub mod writer;
