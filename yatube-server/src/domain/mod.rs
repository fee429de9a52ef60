pub mod comment;
pub mod error;
pub mod filter;
pub mod follow;
pub mod group;
pub mod post;
pub mod user;
pub mod validation;
