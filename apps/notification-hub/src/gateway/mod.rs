pub mod events;
pub mod filter;
pub mod hub;
pub mod pumps;
pub mod scope;
pub mod server;
pub mod session;
