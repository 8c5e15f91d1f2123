pub mod homogenise;
pub mod import;
pub mod init;
pub mod summary;
