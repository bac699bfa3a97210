mod dependencies;
mod list;
mod tailor;

pub use dependencies::cmd_dependencies;
pub use list::cmd_list;
pub use tailor::{TailorArgs, cmd_tailor};
