pub mod request;
pub mod stats;
pub mod template;
pub mod user;
