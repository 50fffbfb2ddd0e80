pub mod identifier;
pub mod password;
pub mod validation;

pub use identifier::IdentifierHasher;
pub use password::{PasswordError, SecretHasher};
