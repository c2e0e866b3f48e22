mod admin;
mod config;

pub use admin::cmd_create_admin;
pub use config::{cmd_check_config, cmd_init};
