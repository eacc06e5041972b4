pub mod object_store;
pub mod local_store;
pub mod layout;
pub mod codec;
pub mod block_store;
pub mod file_lock;
pub mod manifest;
