mod member_activity_store;

#[cfg(test)]
pub use member_activity_store::InMemoryMemberActivityStore;
pub use member_activity_store::{MemberActivityStore, PgMemberActivityStore};
