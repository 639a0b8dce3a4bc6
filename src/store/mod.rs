pub mod local;
pub mod remote;

pub use local::LocalTable;
pub use remote::{RemoteStore, SupabaseStore};
