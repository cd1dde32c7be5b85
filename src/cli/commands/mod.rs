mod history;
mod init;
mod serve;

pub use history::{execute_days, execute_history};
pub use init::execute_init;
pub use serve::execute_serve;
