pub mod dto;
pub mod memory;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use dto::{LoginStatus, RegisterStatus, RoleStatus};
pub use memory::MemoryUserStore;
pub use repo::UserStore;
pub use repo_types::{InsertOutcome, User, ADMIN_ROLE};
pub use services::{DirectoryError, UserDirectory};
