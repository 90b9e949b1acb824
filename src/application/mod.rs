mod error;
mod limits;
mod service;

pub use error::{AppError, LimitPeriod};
pub use limits::LimitPolicy;
pub use service::WalletService;
