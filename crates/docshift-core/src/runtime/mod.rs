pub mod cleanup;
pub mod dispatcher;
pub mod orchestrator;
pub mod progress;
pub mod storage;
pub mod tracker;
pub mod types;
pub mod worker;
pub mod workspace;
