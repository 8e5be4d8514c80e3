mod activity_dto;

pub use activity_dto::{
    ActivityRequest, CommentActivityRequest, CommentLikeActivityRequest, MemberActivityEvent,
    MemberActivityMessage, PostActivityRequest, PostLikeActivityRequest,
};
