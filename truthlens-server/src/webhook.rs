//! Webhook protocol types and signature verification.
//!
//! The mention channel follows the account-activity webhook contract:
//!
//! - **Handshake**: a GET carrying a `crc_token` query parameter must be
//!   answered with the HMAC-SHA256 of the token under the shared secret,
//!   base64-encoded and prefixed with `sha256=`.
//! - **Events**: POST bodies are authenticated by the same HMAC computed
//!   over the raw payload bytes, delivered in the `X-Webhook-Signature`
//!   header. Verification is constant-time.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Prefix on every signature value.
const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute the handshake response token for a challenge.
pub fn challenge_response(secret: &str, crc_token: &str) -> String {
    format!(
        "{SIGNATURE_PREFIX}{}",
        BASE64.encode(hmac_sha256(secret, crc_token.as_bytes()))
    )
}

/// Compute the signature header value for a payload (used by tests and
/// outbound deliveries).
pub fn signature_header(secret: &str, body: &[u8]) -> String {
    format!("{SIGNATURE_PREFIX}{}", BASE64.encode(hmac_sha256(secret, body)))
}

/// Verify a payload signature in constant time.
pub fn verify_signature(secret: &str, body: &[u8], header_value: &str) -> bool {
    let Some(encoded) = header_value.strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(claimed) = BASE64.decode(encoded) else {
        return false;
    };

    // new_from_slice accepts keys of any length for HMAC
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&claimed).is_ok()
}

fn hmac_sha256(secret: &str, message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Envelope delivered by the mention webhook.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub for_user_id: Option<String>,
    #[serde(default)]
    pub tweet_create_events: Vec<MentionEvent>,
}

/// A single mention event.
#[derive(Debug, Clone, Deserialize)]
pub struct MentionEvent {
    pub id_str: String,
    #[serde(default)]
    pub text: String,
    pub user: EventUser,
    #[serde(default)]
    pub entities: Option<MediaEntities>,
    #[serde(default)]
    pub extended_entities: Option<MediaEntities>,
}

/// The author of a mention.
#[derive(Debug, Clone, Deserialize)]
pub struct EventUser {
    pub id_str: String,
    pub screen_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaEntities {
    #[serde(default)]
    pub media: Vec<MediaEntry>,
}

/// One attached media entry.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaEntry {
    #[serde(default)]
    pub media_url_https: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl MediaEntry {
    fn url(&self) -> Option<&str> {
        self.media_url_https
            .as_deref()
            .or(self.media_url.as_deref())
    }
}

impl MentionEvent {
    /// The primary image of the event: the first photo in payload order,
    /// with `extended_entities` (which carries the full media list) taking
    /// precedence over `entities`. Deterministic for a given payload.
    pub fn primary_image(&self) -> Option<&str> {
        self.extended_entities
            .iter()
            .chain(self.entities.iter())
            .flat_map(|e| e.media.iter())
            .find(|m| m.kind == "photo")
            .and_then(|m| m.url())
    }
}
