//! CAPTCHA (Turnstile) verification — a thin adapter. Verification itself is
//! an external collaborator out of this system's scope; this module only
//! owns the header contract and the pass/fail decision the orchestrator
//! acts on.

use reqwest::Client;
use serde::Deserialize;

const VERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

#[derive(Debug, Deserialize)]
struct TurnstileResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

/// Outcome of a CAPTCHA check, carrying the upstream error codes on failure
/// so the 403 body can surface them per spec.md §7.
pub enum CaptchaOutcome {
    Passed,
    Failed(Vec<String>),
}

/// Calls the external verifier with `token` and `secret_key`. A transport
/// failure is treated as a failed verification (fail-closed) with a
/// synthetic error code rather than propagating a 500.
pub async fn verify(client: &Client, secret_key: &str, token: &str) -> CaptchaOutcome {
    let response = client
        .post(VERIFY_URL)
        .form(&[("secret", secret_key), ("response", token)])
        .send()
        .await;

    let response = match response {
        Ok(r) => r,
        Err(err) => {
            tracing::warn!(error = %err, "captcha verifier request failed");
            return CaptchaOutcome::Failed(vec!["verifier-unreachable".to_string()]);
        }
    };

    match response.json::<TurnstileResponse>().await {
        Ok(body) if body.success => CaptchaOutcome::Passed,
        Ok(body) => CaptchaOutcome::Failed(body.error_codes),
        Err(err) => {
            tracing::warn!(error = %err, "captcha verifier response failed to decode");
            CaptchaOutcome::Failed(vec!["verifier-bad-response".to_string()])
        }
    }
}
