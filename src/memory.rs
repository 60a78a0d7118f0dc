use crate::message::Message;

/// Append-only transcript whose first entry is always the system instruction.
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
}

impl ConversationMemory {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Appends a message. System messages after the first are stored as-is;
    /// nothing is ever reordered or dropped.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    #[test]
    fn starts_with_the_system_instruction() {
        let memory = ConversationMemory::new("be helpful");
        assert_eq!(memory.messages().len(), 1);
        assert_eq!(memory.messages()[0].role, Role::System);
        assert_eq!(memory.messages()[0].content, "be helpful");
    }

    #[test]
    fn preserves_insertion_order_and_duplicates() {
        let mut memory = ConversationMemory::new("sys");
        memory.push(Message::user("again"));
        memory.push(Message::assistant("reply"));
        memory.push(Message::user("again"));

        let contents: Vec<&str> = memory.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["sys", "again", "reply", "again"]);
        assert_eq!(memory.messages()[3].role, Role::User);
    }
}
