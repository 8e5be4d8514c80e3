pub mod dtos;
pub mod mapper;
pub mod models;
pub mod stores;

pub use stores::{MemberActivityStore, PgMemberActivityStore};
