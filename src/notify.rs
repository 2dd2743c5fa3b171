use crate::config::{EmailRelayConfig, SmsConfig};
use crate::errors::AppError;
use crate::models::{KycVerificationResponse, NotificationOutcome};
use async_trait::async_trait;
use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;
use serde_json::json;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

pub const EMAIL_CHANNEL: &str = "email";
pub const SMS_CHANNEL: &str = "sms";

const EMAIL_SUBJECT: &str = "Your KYC Verification Report";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Outbound channel for verification reports.
///
/// `deliver` returns `Ok` for both sent and skipped outcomes (bad address,
/// missing configuration) and `Err` only for transport failures, which are
/// what the circuit breaker counts.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> &'static str;

    /// Whether this channel should be attempted for the report at all.
    fn applies_to(&self, _report: &KycVerificationResponse) -> bool {
        true
    }

    async fn deliver(&self, report: &KycVerificationResponse)
        -> Result<NotificationOutcome, AppError>;

    /// Delivers the report; never fails.
    async fn send(&self, report: &KycVerificationResponse) -> NotificationOutcome {
        match self.deliver(report).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("{} notification failed: {}", self.channel(), e);
                NotificationOutcome::failed(self.channel(), e.to_string())
            }
        }
    }
}

/// Sends the report through every applicable notifier, in order.
pub async fn notify_all(
    notifiers: &[Arc<dyn Notifier>],
    report: &KycVerificationResponse,
) -> Vec<NotificationOutcome> {
    let mut outcomes = Vec::with_capacity(notifiers.len());
    for notifier in notifiers.iter().filter(|n| n.applies_to(report)) {
        outcomes.push(notifier.send(report).await);
    }
    outcomes
}

fn http_client() -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(20))
        .build()
        .map_err(|e| AppError::ExternalApiError(format!("Failed to create HTTP client: {}", e)))
}

// ============ Email ============

/// Plain-text report body.
pub fn email_body(report: &KycVerificationResponse) -> String {
    let deepfake = &report.deepfake_analysis;
    [
        "Hello,".to_string(),
        String::new(),
        "Your KYC verification has been processed.".to_string(),
        String::new(),
        format!("Final status: {}", report.final_status),
        format!("Face similarity: {}", report.similarity),
        String::new(),
        "Deepfake analysis:".to_string(),
        format!("- Is deepfake: {}", deepfake.is_deepfake),
        format!("- Authenticity score: {}", deepfake.authenticity_score),
        format!("- Confidence: {}", deepfake.confidence),
        format!("- Status: {}", deepfake.status),
        format!("- Recommendation: {}", deepfake.recommendation),
        String::new(),
        "Regards,".to_string(),
        "AI KYC System".to_string(),
    ]
    .join("\n")
}

pub fn is_valid_email(raw: &str) -> bool {
    EMAIL_RE.is_match(raw.trim())
}

/// Posts the report to an HTTP mail relay.
pub struct EmailNotifier {
    client: reqwest::Client,
    config: Option<EmailRelayConfig>,
}

impl EmailNotifier {
    pub fn new(config: Option<EmailRelayConfig>) -> Result<Self, AppError> {
        Ok(Self {
            client: http_client()?,
            config,
        })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> &'static str {
        EMAIL_CHANNEL
    }

    async fn deliver(
        &self,
        report: &KycVerificationResponse,
    ) -> Result<NotificationOutcome, AppError> {
        let to = report.email.trim();
        if !is_valid_email(to) {
            tracing::warn!("Skipping email notification: invalid destination");
            return Ok(NotificationOutcome::failed(
                EMAIL_CHANNEL,
                format!("Invalid destination email: {:?}", report.email),
            ));
        }

        let Some(config) = &self.config else {
            return Ok(NotificationOutcome::failed(
                EMAIL_CHANNEL,
                "Email is not configured. Set EMAIL_RELAY_URL, EMAIL_RELAY_TOKEN and EMAIL_FROM.",
            ));
        };

        let body = json!({
            "from": config.from,
            "to": to,
            "subject": EMAIL_SUBJECT,
            "text": email_body(report),
        });

        let response = self
            .client
            .post(&config.url)
            .bearer_auth(&config.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Email relay request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Email relay returned {}: {}",
                status, error_text
            )));
        }

        tracing::info!(
            "KYC report emailed for verification {}",
            report.verification_id
        );
        Ok(NotificationOutcome::sent(EMAIL_CHANNEL, None))
    }
}

// ============ SMS ============

/// Keeps only the last four characters of a phone number for logging.
pub fn mask_phone(raw: &str) -> String {
    let chars: Vec<char> = raw.trim().chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("***{}", tail)
}

/// Validates and normalizes an Indian phone number to E.164 (+919876543210).
pub fn validate_in_phone(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.len() < 8 {
        return Err("Phone too short".to_string());
    }

    match phonenumber::parse(Some(CountryId::IN), raw) {
        Ok(number) => {
            if phonenumber::is_valid(&number) {
                let formatted = number.format().mode(Mode::E164).to_string();
                tracing::debug!("Valid phone {}", mask_phone(&formatted));
                Ok(formatted)
            } else {
                tracing::warn!("Invalid phone number {}", mask_phone(raw));
                Err("Invalid phone number".to_string())
            }
        }
        Err(e) => {
            tracing::warn!("Failed to parse phone {}: {:?}", mask_phone(raw), e);
            Err(format!("Parse error: {:?}", e))
        }
    }
}

/// Short report, kept within a single SMS segment.
pub fn sms_body(report: &KycVerificationResponse) -> String {
    format!(
        "KYC Verification Complete\nStatus: {}\nFace Match: {}\nCheck email for full report.",
        report.final_status, report.similarity
    )
}

/// Sends the short report through the Twilio Messages API.
pub struct SmsNotifier {
    client: reqwest::Client,
    config: Option<SmsConfig>,
}

#[derive(Debug, serde::Deserialize)]
struct TwilioMessage {
    sid: Option<String>,
}

impl SmsNotifier {
    pub fn new(config: Option<SmsConfig>) -> Result<Self, AppError> {
        Ok(Self {
            client: http_client()?,
            config,
        })
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    fn channel(&self) -> &'static str {
        SMS_CHANNEL
    }

    fn applies_to(&self, report: &KycVerificationResponse) -> bool {
        report
            .phone
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty())
    }

    async fn deliver(
        &self,
        report: &KycVerificationResponse,
    ) -> Result<NotificationOutcome, AppError> {
        let raw = report.phone.as_deref().unwrap_or_default();
        let to = match validate_in_phone(raw) {
            Ok(to) => to,
            Err(reason) => {
                return Ok(NotificationOutcome::failed(
                    SMS_CHANNEL,
                    format!("Invalid phone number {:?}: {}", raw, reason),
                ))
            }
        };

        let Some(config) = &self.config else {
            return Ok(NotificationOutcome::failed(
                SMS_CHANNEL,
                "SMS is not configured. Set TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN, and TWILIO_PHONE_NUMBER.",
            ));
        };

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            config.base_url, config.account_sid
        );
        let body = sms_body(report);
        let form = [
            ("To", to.as_str()),
            ("From", config.from_number.as_str()),
            ("Body", body.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&config.account_sid, Some(&config.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Twilio request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Twilio returned {}: {}",
                status, error_text
            )));
        }

        let message: TwilioMessage = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Twilio response: {}", e))
        })?;

        tracing::info!(
            "KYC SMS sent for verification {} (sid: {:?})",
            report.verification_id,
            message.sid
        );
        Ok(NotificationOutcome::sent(
            SMS_CHANNEL,
            Some(format!("SMS sent to {}", to)),
        ))
    }
}

// ============ Circuit breaking ============

/// Wraps a notifier with a circuit breaker; while open, deliveries are skipped.
pub struct GuardedNotifier<N, B> {
    inner: N,
    breaker: B,
}

impl<N, B> GuardedNotifier<N, B>
where
    N: Notifier,
    B: failsafe::CircuitBreaker + Send + Sync,
{
    pub fn new(inner: N, breaker: B) -> Self {
        Self { inner, breaker }
    }

    fn circuit_open(&self) -> NotificationOutcome {
        tracing::warn!(
            "{} circuit open, skipping notification",
            self.inner.channel()
        );
        NotificationOutcome::failed(
            self.inner.channel(),
            format!("{} temporarily unavailable (circuit open)", self.inner.channel()),
        )
    }
}

#[async_trait]
impl<N, B> Notifier for GuardedNotifier<N, B>
where
    N: Notifier,
    B: failsafe::CircuitBreaker + Send + Sync,
{
    fn channel(&self) -> &'static str {
        self.inner.channel()
    }

    fn applies_to(&self, report: &KycVerificationResponse) -> bool {
        self.inner.applies_to(report)
    }

    async fn deliver(
        &self,
        report: &KycVerificationResponse,
    ) -> Result<NotificationOutcome, AppError> {
        if !self.breaker.is_call_permitted() {
            return Ok(self.circuit_open());
        }

        let result = self.inner.deliver(report).await;
        match self.breaker.call(|| result) {
            Ok(outcome) => Ok(outcome),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => Ok(self.circuit_open()),
        }
    }
}
