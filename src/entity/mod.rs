pub mod comment;
pub mod like;
pub mod user;
pub mod wish;
