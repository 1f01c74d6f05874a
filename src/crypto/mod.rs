pub mod gravatar;
pub mod password;

pub use gravatar::gravatar_url;
pub use password::Hasher;
