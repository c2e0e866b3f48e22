pub use super::request_files::Entity as RequestFiles;
pub use super::requests::Entity as Requests;
pub use super::templates::Entity as Templates;
pub use super::users::Entity as Users;
