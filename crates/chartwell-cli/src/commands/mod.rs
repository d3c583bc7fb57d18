//! Command implementations.

pub mod batch;
pub mod capabilities;
pub mod process;
pub mod show;

pub use self::batch::execute_batch;
pub use self::capabilities::execute_capabilities;
pub use self::process::execute_process;
pub use self::show::execute_show;
