//! Business logic services layer

pub mod action_service;
pub mod identity_service;
pub mod import_service;
pub mod server_service;

pub use action_service::ActionService;
pub use identity_service::IdentityService;
pub use import_service::ImportService;
pub use server_service::ServerService;
