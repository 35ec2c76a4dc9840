pub mod compare;
pub mod init;
pub mod score;
pub mod show;
pub mod validate;
