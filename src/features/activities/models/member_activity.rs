use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Kind of member activity carried in activity events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "member_activity_type", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberActivityType {
    PostCreate,
    PostUpdate,
    PostDelete,
    PostRead,
    CommentCreate,
    CommentUpdate,
    CommentDelete,
    MemberFollow,
    MemberUnfollow,
    PostLike,
    PostLikeCancel,
    CommentLike,
    CommentLikeCancel,
}

/// Shape of the activity, deciding which ids it carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityGroup {
    Post,
    Comment,
    Member,
    PostLike,
    CommentLike,
}

impl MemberActivityType {
    /// Declaration order; per-type Redis queues are drained in this order
    pub const ALL: [MemberActivityType; 13] = [
        MemberActivityType::PostCreate,
        MemberActivityType::PostUpdate,
        MemberActivityType::PostDelete,
        MemberActivityType::PostRead,
        MemberActivityType::CommentCreate,
        MemberActivityType::CommentUpdate,
        MemberActivityType::CommentDelete,
        MemberActivityType::MemberFollow,
        MemberActivityType::MemberUnfollow,
        MemberActivityType::PostLike,
        MemberActivityType::PostLikeCancel,
        MemberActivityType::CommentLike,
        MemberActivityType::CommentLikeCancel,
    ];

    pub fn group(&self) -> ActivityGroup {
        match self {
            MemberActivityType::PostCreate
            | MemberActivityType::PostUpdate
            | MemberActivityType::PostDelete
            | MemberActivityType::PostRead => ActivityGroup::Post,
            MemberActivityType::CommentCreate
            | MemberActivityType::CommentUpdate
            | MemberActivityType::CommentDelete => ActivityGroup::Comment,
            MemberActivityType::MemberFollow | MemberActivityType::MemberUnfollow => {
                ActivityGroup::Member
            }
            MemberActivityType::PostLike | MemberActivityType::PostLikeCancel => {
                ActivityGroup::PostLike
            }
            MemberActivityType::CommentLike | MemberActivityType::CommentLikeCancel => {
                ActivityGroup::CommentLike
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberActivityType::PostCreate => "POST_CREATE",
            MemberActivityType::PostUpdate => "POST_UPDATE",
            MemberActivityType::PostDelete => "POST_DELETE",
            MemberActivityType::PostRead => "POST_READ",
            MemberActivityType::CommentCreate => "COMMENT_CREATE",
            MemberActivityType::CommentUpdate => "COMMENT_UPDATE",
            MemberActivityType::CommentDelete => "COMMENT_DELETE",
            MemberActivityType::MemberFollow => "MEMBER_FOLLOW",
            MemberActivityType::MemberUnfollow => "MEMBER_UNFOLLOW",
            MemberActivityType::PostLike => "POST_LIKE",
            MemberActivityType::PostLikeCancel => "POST_LIKE_CANCEL",
            MemberActivityType::CommentLike => "COMMENT_LIKE",
            MemberActivityType::CommentLikeCancel => "COMMENT_LIKE_CANCEL",
        }
    }
}

impl std::fmt::Display for MemberActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category recorded on dead letters; selects the request payload shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "activity_category", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityCategory {
    Post,
    Comment,
    PostLike,
    CommentLike,
}

impl std::fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityCategory::Post => write!(f, "POST"),
            ActivityCategory::Comment => write!(f, "COMMENT"),
            ActivityCategory::PostLike => write!(f, "POST_LIKE"),
            ActivityCategory::CommentLike => write!(f, "COMMENT_LIKE"),
        }
    }
}

/// Row of `member_activities`
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct MemberActivity {
    pub id: Uuid,
    pub member_id: i64,
    pub post_id: Option<i64>,
    pub comment_id: Option<i64>,
    pub member_activity_type: MemberActivityType,
    /// Source message key; activities with a key are upserted by it
    pub message_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemberActivity {
    fn new(
        member_id: i64,
        post_id: Option<i64>,
        comment_id: Option<i64>,
        member_activity_type: MemberActivityType,
        message_key: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            member_id,
            post_id,
            comment_id,
            member_activity_type,
            message_key,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn post(
        member_id: i64,
        post_id: i64,
        activity_type: MemberActivityType,
        message_key: Option<String>,
    ) -> Self {
        Self::new(member_id, Some(post_id), None, activity_type, message_key)
    }

    pub fn comment(
        member_id: i64,
        post_id: i64,
        comment_id: i64,
        activity_type: MemberActivityType,
        message_key: Option<String>,
    ) -> Self {
        Self::new(
            member_id,
            Some(post_id),
            Some(comment_id),
            activity_type,
            message_key,
        )
    }

    pub fn member(
        member_id: i64,
        activity_type: MemberActivityType,
        message_key: Option<String>,
    ) -> Self {
        Self::new(member_id, None, None, activity_type, message_key)
    }

    pub fn post_like(
        member_id: i64,
        post_id: i64,
        activity_type: MemberActivityType,
        message_key: Option<String>,
    ) -> Self {
        Self::new(member_id, Some(post_id), None, activity_type, message_key)
    }

    pub fn comment_like(
        member_id: i64,
        comment_id: i64,
        activity_type: MemberActivityType,
        message_key: Option<String>,
    ) -> Self {
        Self::new(member_id, None, Some(comment_id), activity_type, message_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_type_has_a_group() {
        let post_types: Vec<_> = MemberActivityType::ALL
            .iter()
            .filter(|t| t.group() == ActivityGroup::Post)
            .collect();
        assert_eq!(post_types.len(), 4);
        assert_eq!(
            MemberActivityType::CommentLikeCancel.group(),
            ActivityGroup::CommentLike
        );
        assert_eq!(
            MemberActivityType::MemberFollow.group(),
            ActivityGroup::Member
        );
    }

    #[test]
    fn test_type_serializes_like_as_str() {
        for activity_type in MemberActivityType::ALL {
            let json = serde_json::to_string(&activity_type).unwrap();
            assert_eq!(json, format!("\"{}\"", activity_type.as_str()));
        }
    }

    #[test]
    fn test_comment_like_has_no_post() {
        let activity =
            MemberActivity::comment_like(7, 99, MemberActivityType::CommentLike, None);
        assert_eq!(activity.post_id, None);
        assert_eq!(activity.comment_id, Some(99));
        assert_eq!(activity.created_at, activity.updated_at);
    }
}
