//! CLI command implementations

mod capture;
mod init;
mod list;

pub use capture::run_capture;
pub use init::run_init;
pub use list::run_list;
