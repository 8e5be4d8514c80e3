mod member_activity;

pub use member_activity::{ActivityCategory, ActivityGroup, MemberActivity, MemberActivityType};
