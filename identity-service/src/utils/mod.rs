pub mod password;
pub mod validation;

pub use password::{CredentialError, CredentialHasher, Password, PasswordHashString};
pub use validation::ValidatedJson;
