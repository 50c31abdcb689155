pub mod ingestion;
pub mod restream_queue;
pub mod stream_monitor;
