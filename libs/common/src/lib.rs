pub mod id;
pub mod role;

pub use id::{ConnectionId, PrefixedId};
pub use role::Role;
