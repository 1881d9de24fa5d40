pub mod analyze;
pub mod init;
pub mod list;
pub mod validate;
