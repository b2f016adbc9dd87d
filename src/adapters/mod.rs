// Adapters layer: concrete implementations for storage and notification ports.
// Local and S3 storage live next to their configs under src/config.

pub mod memory;
pub mod notify;

pub use memory::{MemoryStorage, StoredObject};
pub use notify::{LogNotifier, RecordingNotifier, WebhookNotifier};
