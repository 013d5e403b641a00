pub mod server;

pub use server::BlockchainServer;
