#[cfg(test)]
#[path = "transcript_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;

use super::Message;

/// Ordered conversation state. Append only, except for the trailing
/// assistant message while it is open for streaming.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
    open: bool,
}

impl Transcript {
    pub fn from_messages(messages: Vec<Message>) -> Transcript {
        return Transcript {
            messages,
            open: false,
        };
    }

    pub fn messages(&self) -> &[Message] {
        return &self.messages;
    }

    pub fn len(&self) -> usize {
        return self.messages.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.messages.is_empty();
    }

    pub fn last(&self) -> Option<&Message> {
        return self.messages.last();
    }

    pub fn is_open(&self) -> bool {
        return self.open;
    }

    pub fn push_user(&mut self, content: &str) -> Result<()> {
        if self.open {
            bail!("Cannot append a user message while a response is streaming");
        }

        self.messages.push(Message::user(content));
        return Ok(());
    }

    /// Appends the empty assistant message that fragments stream into.
    pub fn open_assistant(&mut self) -> Result<()> {
        if self.open {
            bail!("An assistant message is already open");
        }

        self.messages.push(Message::assistant(""));
        self.open = true;
        return Ok(());
    }

    /// Appends text to the open message and returns its full content, or
    /// `None` when nothing is open.
    pub fn append_open(&mut self, text: &str) -> Option<&str> {
        if !self.open {
            return None;
        }

        let last = self.messages.last_mut()?;
        last.append(text);
        return Some(&last.content);
    }

    pub fn open_content(&self) -> Option<&str> {
        if !self.open {
            return None;
        }

        return self.messages.last().map(|msg| {
            return msg.content.as_str();
        });
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn clear(&mut self) -> Result<()> {
        if self.open {
            bail!("Cannot clear the transcript while a response is streaming");
        }

        self.messages.clear();
        return Ok(());
    }
}
