//! Pipeline engines: Bronze capture, Silver upsert, audit, publish,
//! rebuild, purge, and the operational log they all write to.

pub mod audit_engine;
pub mod bronze_writer;
pub mod denormalizer;
pub mod ops_log;
pub mod publish_engine;
pub mod purge_engine;
pub mod rebuild_engine;
pub mod upsert_engine;
