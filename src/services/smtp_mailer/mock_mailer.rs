use crate::services::recipients::Recipient;
use crate::services::smtp_mailer::{MailError, Mailer};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEmail {
    pub recipients: Vec<Recipient>,
    pub subject: String,
    pub body: String,
}

/// A mock mailer that records sent emails for testing purposes.
#[derive(Debug, Default)]
pub struct MockMailer {
    pub sent_emails: Mutex<Vec<RecordedEmail>>,
    pub fail_send: bool,
}

impl MockMailer {
    pub fn failing() -> Self {
        Self {
            sent_emails: Mutex::new(vec![]),
            fail_send: true,
        }
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_bulk(
        &self,
        recipients: &[Recipient],
        subject: &str,
        body: &str,
    ) -> Result<usize, MailError> {
        if self.fail_send {
            return Err(MailError::SendError("mock transport failure".into()));
        }
        self.sent_emails.lock().unwrap().push(RecordedEmail {
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(recipients.len())
    }
}
