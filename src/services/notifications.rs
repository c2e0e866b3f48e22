//! Transactional email.
//!
//! Handlers hand a [`NotificationEvent`] to the [`NotificationDispatcher`],
//! which queues it and returns immediately. A detached worker renders the
//! event and pushes each message through a [`Mailer`]. Delivery failures are
//! logged and never reach the caller.

use async_trait::async_trait;
use html_escape::encode_text;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Mail API rejected message: status={status} body={body}")]
    Rejected { status: u16, body: String },

    #[error("Mail is not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// JSON mail API (`SendGrid` v3 shape), authenticated with a bearer key.
pub struct HttpMailer {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    from_email: String,
    from_name: String,
}

impl HttpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| MailError::NotConfigured("mail.api_key".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key,
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
        })
    }
}

#[derive(Serialize)]
struct MailBody<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'static str,
    value: &'a str,
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let body = MailBody {
            personalizations: vec![Personalization {
                to: vec![Address {
                    email: &email.to,
                    name: None,
                }],
            }],
            from: Address {
                email: &self.from_email,
                name: Some(&self.from_name),
            },
            subject: &email.subject,
            content: vec![
                Content {
                    content_type: "text/plain",
                    value: &email.text,
                },
                Content {
                    content_type: "text/html",
                    value: &email.html,
                },
            ],
        };

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Used when mail is disabled: the rendered message is only logged.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "Email (mail disabled, not sent)");
        debug!(text = %email.text, "Email body");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    NewRequest {
        agent_name: String,
        request_title: String,
    },
    RequestCompleted {
        agent_name: String,
        agent_email: String,
        request_title: String,
    },
    PasswordReset {
        name: String,
        email: String,
        token: String,
        expires_minutes: i64,
    },
}

impl NotificationEvent {
    const fn kind(&self) -> &'static str {
        match self {
            Self::NewRequest { .. } => "new_request",
            Self::RequestCompleted { .. } => "request_completed",
            Self::PasswordReset { .. } => "password_reset",
        }
    }
}

struct Layout<'a> {
    title: &'a str,
    /// Already escaped HTML fragments, one paragraph each.
    lines: &'a [String],
    button_label: &'a str,
    button_href: &'a str,
}

fn render_html(layout: &Layout<'_>) -> String {
    let paragraphs: String = layout
        .lines
        .iter()
        .map(|line| {
            format!(
                r#"<p style="margin:0 0 8px 0; font-size:14px; line-height:1.5; color:#111827;">{line}</p>"#
            )
        })
        .collect();

    let title = encode_text(layout.title);
    let href = html_escape::encode_double_quoted_attribute(layout.button_href);
    let label = encode_text(layout.button_label);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <title>{title}</title>
  </head>
  <body style="margin:0; padding:0; background-color:#f3f4f6; font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',sans-serif;">
    <table role="presentation" cellspacing="0" cellpadding="0" border="0" width="100%">
      <tr>
        <td align="center" style="padding:32px 16px;">
          <table role="presentation" cellspacing="0" cellpadding="0" border="0" width="100%" style="max-width:600px; background:#ffffff; border-radius:8px; overflow:hidden;">
            <tr>
              <td style="padding:20px 24px; background:#111827;">
                <h1 style="margin:0; font-size:18px; font-weight:600; color:#f9fafb;">One West Group</h1>
                <p style="margin:4px 0 0 0; font-size:12px; color:#d1d5db;">Marketing Requests Platform</p>
              </td>
            </tr>
            <tr>
              <td style="padding:24px;">
                <h2 style="margin:0 0 12px 0; font-size:16px; font-weight:600; color:#111827;">{title}</h2>
                {paragraphs}
                <p style="margin-top:20px;">
                  <a href="{href}" style="display:inline-block; padding:10px 18px; background-color:#111827; color:#f9fafb; text-decoration:none; border-radius:6px; font-size:14px;">{label}</a>
                </p>
              </td>
            </tr>
            <tr>
              <td style="padding:16px 24px; border-top:1px solid #e5e7eb;">
                <p style="margin:0; font-size:11px; color:#6b7280;">This is an automated message from the One West Group marketing request system.</p>
              </td>
            </tr>
          </table>
        </td>
      </tr>
    </table>
  </body>
</html>"#
    )
}

fn dashboard_link(config: &MailConfig, path: &str) -> String {
    format!("{}{path}", config.dashboard_url.trim_end_matches('/'))
}

/// Renders every message an event produces, in send order.
#[must_use]
pub fn render(event: &NotificationEvent, config: &MailConfig) -> Vec<Email> {
    let admin_link = dashboard_link(config, "/dashboard/admin/requests");

    match event {
        NotificationEvent::NewRequest {
            agent_name,
            request_title,
        } => {
            let title = "New Marketing Request Received";
            let lines = [
                format!(
                    "A new marketing request has been submitted by <strong>{}</strong>.",
                    encode_text(agent_name)
                ),
                format!("Request Title: <strong>{}</strong>.", encode_text(request_title)),
                "Please review and assign this request in your dashboard.".to_string(),
            ];

            vec![Email {
                to: config.admin_email.clone(),
                subject: title.to_string(),
                html: render_html(&Layout {
                    title,
                    lines: &lines,
                    button_label: "Open Admin Dashboard",
                    button_href: &admin_link,
                }),
                text: format!(
                    "A new marketing request has been submitted by {agent_name}.\n\n\
                     Request Title: {request_title}\n\n\
                     Please review it on the dashboard."
                ),
            }]
        }
        NotificationEvent::RequestCompleted {
            agent_name,
            agent_email,
            request_title,
        } => {
            let subject = "Your Marketing Request Has Been Completed";
            let agent_lines = [
                format!("Dear <strong>{}</strong>,", encode_text(agent_name)),
                format!(
                    "Your marketing request titled <strong>\"{}\"</strong> has been completed.",
                    encode_text(request_title)
                ),
                "You can download or review the final files by logging into your dashboard."
                    .to_string(),
            ];
            let admin_lines = [
                format!(
                    "The marketing request titled <strong>\"{}\"</strong> has been marked as completed.",
                    encode_text(request_title)
                ),
                "You can review the final files and status in the admin dashboard.".to_string(),
            ];
            let agent_link = dashboard_link(config, "/dashboard/agent/requests");

            vec![
                Email {
                    to: agent_email.clone(),
                    subject: subject.to_string(),
                    html: render_html(&Layout {
                        title: subject,
                        lines: &agent_lines,
                        button_label: "View Your Request",
                        button_href: &agent_link,
                    }),
                    text: format!(
                        "Dear {agent_name},\n\n\
                         Your request \"{request_title}\" has been completed.\n\
                         You can download or review it by logging into your dashboard.\n\n\
                         Thank you."
                    ),
                },
                Email {
                    to: config.admin_email.clone(),
                    subject: subject.to_string(),
                    html: render_html(&Layout {
                        title: "Marketing Request Completed",
                        lines: &admin_lines,
                        button_label: "Open Admin Dashboard",
                        button_href: &admin_link,
                    }),
                    text: format!(
                        "The marketing request \"{request_title}\" has been marked as completed.\n\n\
                         You can review it in the admin dashboard."
                    ),
                },
            ]
        }
        NotificationEvent::PasswordReset {
            name,
            email,
            token,
            expires_minutes,
        } => {
            let title = "Reset Your Password";
            let link = dashboard_link(config, &format!("/reset-password?token={token}"));
            let lines = [
                format!("Hello <strong>{}</strong>,", encode_text(name)),
                "We received a request to reset the password for your account.".to_string(),
                format!("This link expires in {expires_minutes} minutes. If you did not ask for a reset, you can ignore this email."),
            ];

            vec![Email {
                to: email.clone(),
                subject: title.to_string(),
                html: render_html(&Layout {
                    title,
                    lines: &lines,
                    button_label: "Reset Password",
                    button_href: &link,
                }),
                text: format!(
                    "Hello {name},\n\n\
                     Reset your password using this link (valid for {expires_minutes} minutes):\n{link}\n\n\
                     If you did not ask for a reset, you can ignore this email."
                ),
            }]
        }
    }
}

/// Cheap to clone; every clone feeds the same worker.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<NotificationEvent>,
}

impl NotificationDispatcher {
    /// Spawns the delivery worker. It exits once every dispatcher clone has
    /// been dropped and the queue is drained; await the handle to wait for it.
    #[must_use]
    pub fn start(mailer: Arc<dyn Mailer>, config: MailConfig) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<NotificationEvent>(config.queue_size.max(1));

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let kind = event.kind();
                for email in render(&event, &config) {
                    match mailer.send(&email).await {
                        Ok(()) => {
                            metrics::counter!("reqdesk_emails_sent_total", "event" => kind)
                                .increment(1);
                            info!(event = kind, to = %email.to, "Notification sent");
                        }
                        Err(e) => {
                            metrics::counter!("reqdesk_emails_failed_total", "event" => kind)
                                .increment(1);
                            error!(event = kind, to = %email.to, error = %e, "Failed to send notification");
                        }
                    }
                }
            }
            info!("Notification worker stopped");
        });

        (Self { tx }, handle)
    }

    /// Never blocks and never fails the caller.
    pub fn dispatch(&self, event: NotificationEvent) {
        let kind = event.kind();
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                metrics::counter!("reqdesk_emails_dropped_total", "event" => kind).increment(1);
                warn!(event = kind, "Notification queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(event = kind, "Notification worker stopped, dropping event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording(Arc<Mutex<Vec<Email>>>);

    #[async_trait]
    impl Mailer for Recording {
        async fn send(&self, email: &Email) -> Result<(), MailError> {
            self.0.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Mailer for Failing {
        async fn send(&self, _email: &Email) -> Result<(), MailError> {
            Err(MailError::NotConfigured("test".to_string()))
        }
    }

    fn completed() -> NotificationEvent {
        NotificationEvent::RequestCompleted {
            agent_name: "Xena".to_string(),
            agent_email: "xena@example.com".to_string(),
            request_title: "Spring Promo".to_string(),
        }
    }

    #[test]
    fn test_completion_mails_agent_and_admin() {
        let config = MailConfig::default();
        let emails = render(&completed(), &config);

        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0].to, "xena@example.com");
        assert_eq!(emails[1].to, "admin@account.com");
        assert!(emails[0].html.contains("/dashboard/agent/requests"));
        assert!(emails[1].html.contains("/dashboard/admin/requests"));
        assert!(emails[0].text.contains("Spring Promo"));
    }

    #[test]
    fn test_new_request_goes_to_admin_only() {
        let emails = render(
            &NotificationEvent::NewRequest {
                agent_name: "Xena".to_string(),
                request_title: "Flyer".to_string(),
            },
            &MailConfig::default(),
        );

        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].to, "admin@account.com");
        assert_eq!(emails[0].subject, "New Marketing Request Received");
    }

    #[test]
    fn test_user_strings_are_escaped() {
        let emails = render(
            &NotificationEvent::NewRequest {
                agent_name: "<script>alert(1)</script>".to_string(),
                request_title: "A & B".to_string(),
            },
            &MailConfig::default(),
        );

        assert!(!emails[0].html.contains("<script>"));
        assert!(emails[0].html.contains("&lt;script&gt;"));
        assert!(emails[0].html.contains("A &amp; B"));
    }

    #[test]
    fn test_reset_link_uses_dashboard_url() {
        let config = MailConfig {
            dashboard_url: "https://app.example.com/".to_string(),
            ..MailConfig::default()
        };
        let emails = render(
            &NotificationEvent::PasswordReset {
                name: "Xena".to_string(),
                email: "xena@example.com".to_string(),
                token: "abc123".to_string(),
                expires_minutes: 30,
            },
            &config,
        );

        assert_eq!(emails.len(), 1);
        assert!(
            emails[0]
                .text
                .contains("https://app.example.com/reset-password?token=abc123")
        );
    }

    #[tokio::test]
    async fn test_worker_delivers_and_drains_on_drop() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let (dispatcher, handle) =
            NotificationDispatcher::start(Arc::new(Recording(sent.clone())), MailConfig::default());

        dispatcher.dispatch(completed());
        drop(dispatcher);
        handle.await.unwrap();

        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let (dispatcher, handle) =
            NotificationDispatcher::start(Arc::new(Failing), MailConfig::default());

        dispatcher.dispatch(completed());
        drop(dispatcher);
        handle.await.unwrap();
    }

    #[test]
    fn test_http_mailer_requires_key() {
        assert!(matches!(
            HttpMailer::new(&MailConfig::default()),
            Err(MailError::NotConfigured(_))
        ));
    }
}
