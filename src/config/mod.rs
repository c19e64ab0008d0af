pub mod sync;

pub use sync::{Credentials, SyncConfig, Tunables};
