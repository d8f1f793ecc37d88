pub mod message;
pub mod presence;

/// Primary key of a row in `users`.
pub type UserId = i32;
/// Primary key of a row in `channels`.
pub type ChannelId = i32;
/// Primary key of a row in `messages`.
pub type MessageId = i32;
