mod limit;
mod money;
mod transaction;
mod wallet;

pub use limit::*;
pub use money::*;
pub use transaction::*;
pub use wallet::*;
