pub mod config;
pub mod error;
pub mod ids;
pub mod provo;
pub mod triple;

pub use config::KylixConfig;
pub use error::KylixError;
pub use ids::{TransactionId, ValidatorId};
pub use triple::Triple;
