use crate::error::{OwnError, Result};
use crate::message::OpenMessage;

/// Replies collected for one request.
///
/// A response is complete once a terminal message (ACK, NACK or BUSY NACK)
/// has been added; the terminal itself is the last element of [`messages`].
///
/// [`messages`]: Response::messages
#[derive(Debug, Clone)]
pub struct Response {
    request: OpenMessage,
    messages: Vec<OpenMessage>,
    complete: bool,
}

impl Response {
    pub fn new(request: OpenMessage) -> Self {
        Self {
            request,
            messages: Vec::new(),
            complete: false,
        }
    }

    /// Append a reply.
    ///
    /// # Errors
    /// `ProtocolViolation` if the response is already complete; the message is not appended.
    pub fn add(&mut self, msg: OpenMessage) -> Result<()> {
        if self.complete {
            return Err(OwnError::ProtocolViolation(format!(
                "{msg} received after the response to {} completed",
                self.request
            )));
        }
        self.complete = msg.is_terminal();
        self.messages.push(msg);
        Ok(())
    }

    pub fn request(&self) -> &OpenMessage {
        &self.request
    }

    /// Replies in arrival order, terminal last
    pub fn messages(&self) -> &[OpenMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<OpenMessage> {
        self.messages
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Complete and terminated by ACK
    pub fn is_success(&self) -> bool {
        self.complete && self.messages.last().is_some_and(|m| m.is_ack())
    }

    pub fn has_busy_nack(&self) -> bool {
        self.messages.last().is_some_and(|m| m.is_busy_nack())
    }
}
