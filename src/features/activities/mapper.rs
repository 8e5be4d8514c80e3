use crate::core::error::{AppError, Result};
use crate::features::activities::dtos::{MemberActivityEvent, MemberActivityMessage};
use crate::features::activities::models::{ActivityGroup, MemberActivity};

/// Parse a serialized [`MemberActivityMessage`] (Redis list entry, stored
/// payload or failure file contents)
pub fn message_from_json(json: &str) -> Result<MemberActivityMessage> {
    Ok(serde_json::from_str(json)?)
}

/// Build the activity row for an event. The ids required by the event's
/// group must be present.
pub fn from_event(event: &MemberActivityEvent, message_key: Option<String>) -> Result<MemberActivity> {
    let activity_type = event.member_activity_type;
    let missing = |field: &str| {
        AppError::Validation(format!(
            "{} event of member {} has no {}",
            activity_type, event.member_id, field
        ))
    };

    Ok(match activity_type.group() {
        ActivityGroup::Post => MemberActivity::post(
            event.member_id,
            event.post_id.ok_or_else(|| missing("postId"))?,
            activity_type,
            message_key,
        ),
        ActivityGroup::Comment => MemberActivity::comment(
            event.member_id,
            event.post_id.ok_or_else(|| missing("postId"))?,
            event.comment_id.ok_or_else(|| missing("commentId"))?,
            activity_type,
            message_key,
        ),
        ActivityGroup::Member => MemberActivity::member(event.member_id, activity_type, message_key),
        ActivityGroup::PostLike => MemberActivity::post_like(
            event.member_id,
            event.post_id.ok_or_else(|| missing("postId"))?,
            activity_type,
            message_key,
        ),
        ActivityGroup::CommentLike => MemberActivity::comment_like(
            event.member_id,
            event.comment_id.ok_or_else(|| missing("commentId"))?,
            activity_type,
            message_key,
        ),
    })
}
