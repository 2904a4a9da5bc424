#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatSender {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub sender: ChatSender,
    pub text: String,
    pub timestamp: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(ChatSender::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(ChatSender::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(ChatSender::System, text)
    }

    fn new(sender: ChatSender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
        }
    }
}
