pub mod conversation;
pub mod todo;

pub use conversation::{Conversation, ConversationSummary, Message, Role};
pub use todo::{NewTodo, Todo, TodoPatch};
