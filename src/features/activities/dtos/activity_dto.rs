use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::features::activities::models::{ActivityCategory, MemberActivity, MemberActivityType};

/// Activity event as published to Kafka
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberActivityEvent {
    pub member_id: i64,
    #[serde(default)]
    pub post_id: Option<i64>,
    #[serde(default)]
    pub comment_id: Option<i64>,
    pub member_activity_type: MemberActivityType,
    /// Local time of the producer, without zone
    pub created_at: NaiveDateTime,
}

/// Keyed envelope around an event; the key deduplicates restores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberActivityMessage {
    pub key: String,
    pub event: MemberActivityEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostActivityRequest {
    pub member_id: i64,
    pub post_id: i64,
    pub activity_type: MemberActivityType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentActivityRequest {
    pub member_id: i64,
    pub post_id: i64,
    pub comment_id: i64,
    pub activity_type: MemberActivityType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostLikeActivityRequest {
    pub member_id: i64,
    pub post_id: i64,
    pub activity_type: MemberActivityType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentLikeActivityRequest {
    pub member_id: i64,
    pub comment_id: i64,
    pub activity_type: MemberActivityType,
}

/// Request payload of a categorised dead letter
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityRequest {
    Post(PostActivityRequest),
    Comment(CommentActivityRequest),
    PostLike(PostLikeActivityRequest),
    CommentLike(CommentLikeActivityRequest),
}

impl ActivityRequest {
    /// Decode `payload` with the shape `category` calls for
    pub fn decode(category: ActivityCategory, payload: &str) -> Result<Self, serde_json::Error> {
        Ok(match category {
            ActivityCategory::Post => Self::Post(serde_json::from_str(payload)?),
            ActivityCategory::Comment => Self::Comment(serde_json::from_str(payload)?),
            ActivityCategory::PostLike => Self::PostLike(serde_json::from_str(payload)?),
            ActivityCategory::CommentLike => Self::CommentLike(serde_json::from_str(payload)?),
        })
    }

    pub fn into_activity(self, message_key: Option<String>) -> MemberActivity {
        match self {
            Self::Post(r) => MemberActivity::post(r.member_id, r.post_id, r.activity_type, message_key),
            Self::Comment(r) => MemberActivity::comment(
                r.member_id,
                r.post_id,
                r.comment_id,
                r.activity_type,
                message_key,
            ),
            Self::PostLike(r) => {
                MemberActivity::post_like(r.member_id, r.post_id, r.activity_type, message_key)
            }
            Self::CommentLike(r) => {
                MemberActivity::comment_like(r.member_id, r.comment_id, r.activity_type, message_key)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_comment_request() {
        let payload = r#"{"memberId":1,"postId":2,"commentId":3,"activityType":"COMMENT_CREATE"}"#;
        let request = ActivityRequest::decode(ActivityCategory::Comment, payload).unwrap();
        let activity = request.into_activity(None);

        assert_eq!(activity.member_id, 1);
        assert_eq!(activity.post_id, Some(2));
        assert_eq!(activity.comment_id, Some(3));
        assert_eq!(
            activity.member_activity_type,
            MemberActivityType::CommentCreate
        );
        assert_eq!(activity.message_key, None);
    }

    #[test]
    fn test_decode_rejects_payload_of_other_category() {
        let payload = r#"{"memberId":1,"postId":2,"activityType":"POST_LIKE"}"#;
        assert!(ActivityRequest::decode(ActivityCategory::CommentLike, payload).is_err());
        assert!(ActivityRequest::decode(ActivityCategory::PostLike, payload).is_ok());
    }

    #[test]
    fn test_message_parses_producer_json() {
        let json = r#"{
            "key": "k-1",
            "event": {
                "memberId": 10,
                "postId": 20,
                "memberActivityType": "POST_READ",
                "createdAt": "2025-03-01T09:30:00"
            }
        }"#;
        let message: MemberActivityMessage = serde_json::from_str(json).unwrap();

        assert_eq!(message.key, "k-1");
        assert_eq!(message.event.comment_id, None);
        assert_eq!(
            message.event.member_activity_type,
            MemberActivityType::PostRead
        );
    }
}
