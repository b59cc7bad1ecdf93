pub mod completion;
pub mod conversation;
pub mod delta;
pub mod message;
pub mod role;
