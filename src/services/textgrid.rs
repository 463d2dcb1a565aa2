// src/services/textgrid.rs

// Cliente da TextGrid (API compatível com Twilio) e utilitários de webhook.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use sha1::Sha1;

use crate::{
    common::error::AppError,
    services::dispatcher::{OutboundSms, SmsGateway, SmsReceipt},
};

pub const DEFAULT_API_URL: &str = "https://api.textgrid.com/2010-04-01";

#[derive(Debug, Clone)]
pub struct TextGridClient {
    client: reqwest::Client,
    account_sid: String,
    base_url: String,
}

impl TextGridClient {
    pub fn new(account_sid: &str, auth_token: &str, base_url: &str) -> Result<Self, AppError> {
        // Bearer com base64("sid:token"), não Basic.
        let credentials = STANDARD.encode(format!("{account_sid}:{auth_token}"));
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {credentials}"))
                .map_err(|e| anyhow::anyhow!("invalid TextGrid credentials header: {e}"))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            account_sid: account_sid.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/Accounts/{}/Messages.json", self.base_url, self.account_sid)
    }
}

#[async_trait]
impl SmsGateway for TextGridClient {
    async fn send_sms(&self, sms: &OutboundSms) -> Result<SmsReceipt, AppError> {
        let response = self
            .client
            .post(self.messages_url())
            .json(sms)
            .send()
            .await
            .map_err(|e| AppError::Dispatch(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "TextGrid recusou o SMS");
            return Err(AppError::Dispatch(format!("gateway returned {status}")));
        }

        let receipt = response
            .json::<SmsReceipt>()
            .await
            .map_err(|e| AppError::Dispatch(format!("invalid gateway response: {e}")))?;

        tracing::debug!(sid = %receipt.sid, status = %receipt.status, "SMS aceito pela TextGrid");
        Ok(receipt)
    }
}

// =========================================================================
//  WEBHOOKS
// =========================================================================

/// `X-TextGrid-Signature` = base64(HMAC-SHA1(secret, url + corpo bruto)).
pub fn verify_signature(secret: &str, url: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha1>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(url.as_bytes());
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

pub fn empty_twiml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?><Response />"#.to_string()
}

pub fn reply_twiml(message: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Response>\n  <Message>{}</Message>\n</Response>",
        escape_xml(message)
    )
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
