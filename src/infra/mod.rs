// Infrastructure adapters implementing application ports
pub mod http_client;
pub mod in_memory;
pub mod jsonl_source;

pub use http_client::HubRowsClient;
pub use in_memory::InMemorySource;
pub use jsonl_source::JsonlSource;
