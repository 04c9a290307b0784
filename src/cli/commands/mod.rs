mod hash_password;
mod init;

pub use hash_password::cmd_hash_password;
pub use init::cmd_init;
