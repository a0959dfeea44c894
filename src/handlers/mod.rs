pub mod health;
pub mod diagnostics;
pub mod session;

pub use health::*;
pub use diagnostics::*;
pub use session::*;
