//! Transactional email. Sends are fire-and-forget: they run on a spawned
//! task and a failed delivery is only logged.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{AppConfig, EmailConfig};

const BREVO_SEND_URL: &str = "https://api.brevo.com/v3/smtp/email";

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_template(&self, to: &str, template_id: i64, params: Value)
        -> anyhow::Result<()>;
}

/// Brevo (formerly Sendinblue) transactional template API.
pub struct BrevoMailer {
    http: reqwest::Client,
    api_key: String,
}

impl BrevoMailer {
    pub fn new(cfg: &EmailConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("build email http client")?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
        })
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    async fn send_template(
        &self,
        to: &str,
        template_id: i64,
        params: Value,
    ) -> anyhow::Result<()> {
        let body = json!({
            "templateId": template_id,
            "to": [{ "email": to }],
            "params": params,
        });
        self.http
            .post(BREVO_SEND_URL)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("send email request")?
            .error_for_status()
            .context("email provider rejected the request")?;
        Ok(())
    }
}

/// Used when `EMAILS_ENABLED` is false.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send_template(&self, to: &str, template_id: i64, _params: Value) -> anyhow::Result<()> {
        debug!(%to, template_id, "emails disabled, skipping send");
        Ok(())
    }
}

pub fn from_config(cfg: &EmailConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    if cfg.enabled {
        Ok(Arc::new(BrevoMailer::new(cfg)?))
    } else {
        Ok(Arc::new(DisabledMailer))
    }
}

fn spawn_send(mailer: Arc<dyn Mailer>, to: String, template_id: i64, params: Value) {
    tokio::spawn(async move {
        match mailer.send_template(&to, template_id, params).await {
            Ok(()) => info!(%to, template_id, "email sent"),
            Err(e) => warn!(%to, template_id, error = %format!("{e:#}"), "email delivery failed"),
        }
    });
}

pub fn send_welcome_email(mailer: Arc<dyn Mailer>, cfg: &AppConfig, to: &str, full_name: &str) {
    let params = json!({
        "projectName": cfg.project_name,
        "fullName": full_name,
        "link": cfg.client_url.clone().unwrap_or_default(),
    });
    spawn_send(mailer, to.to_string(), cfg.emails.welcome_template_id, params);
}

pub fn send_reset_password_email(mailer: Arc<dyn Mailer>, cfg: &AppConfig, to: &str, token: &str) {
    let base = cfg.client_url.as_deref().unwrap_or_default().trim_end_matches('/');
    let params = json!({
        "projectName": cfg.project_name,
        "validMinutes": cfg.jwt.reset_ttl_minutes,
        "link": format!("{base}/reset-password?token={token}"),
    });
    spawn_send(mailer, to.to_string(), cfg.emails.reset_password_template_id, params);
}
