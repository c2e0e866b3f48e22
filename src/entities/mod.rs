pub mod prelude;

pub mod request_files;
pub mod requests;
pub mod templates;
pub mod users;
