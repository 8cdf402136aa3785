pub mod conversation;
pub mod generate;
pub mod todo;
