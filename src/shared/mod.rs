pub mod errors;
pub mod retry;
pub mod shutdown;
pub mod time;

pub use errors::*;
pub use retry::*;
pub use shutdown::*;
pub use time::*;
