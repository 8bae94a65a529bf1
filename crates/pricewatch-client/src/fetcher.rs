use std::net::IpAddr;
use std::time::Duration;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use pricewatch_core::error::AppError;
use pricewatch_core::models::SiteConfig;
use pricewatch_core::traits::Fetcher;
use reqwest::Client;
use url::Url;

/// Attempts per URL, including the first.
const MAX_ATTEMPTS: u32 = 3;

/// HTTP fetcher using reqwest.
///
/// Every attempt is preceded by the site's rate-limit sleep, and the
/// site's custom headers are sent with each request. Failed attempts are
/// retried with exponential backoff (1s, 2s). Response bodies are decoded
/// according to the `Content-Type` charset, falling back to UTF-8.
///
/// By default, SSRF protection is **enabled** — requests to private/reserved
/// IP ranges are blocked. Use [`allow_private_urls`](Self::allow_private_urls)
/// to disable this (e.g., for CLI usage where the user controls the machine).
#[derive(Clone)]
pub struct SiteFetcher {
    client: Client,
    timeout_secs: u64,
    ssrf_protection: bool,
}

impl SiteFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let timeout_secs = timeout.as_secs();
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36")
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs,
            ssrf_protection: true,
        })
    }

    /// Disable SSRF protection, allowing requests to private/reserved IPs.
    ///
    /// Only use this for CLI usage where the user controls the machine.
    pub fn allow_private_urls(mut self) -> Self {
        self.ssrf_protection = false;
        self
    }

    async fn attempt(&self, site: &SiteConfig, url: &str) -> Result<String, AppError> {
        let mut request = self.client.get(url);
        for (name, value) in &site.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))?;

        Ok(decode_body(&bytes, content_type.as_deref()))
    }
}

impl Fetcher for SiteFetcher {
    async fn fetch(&self, site: &SiteConfig, url: &str) -> Result<String, AppError> {
        if self.ssrf_protection {
            validate_url(url).await?;
        }

        let mut last_error = None;
        for attempt in 0..MAX_ATTEMPTS {
            // Rate limit applies to every attempt, not just the first.
            tokio::time::sleep(site.rate_limit()).await;

            match self.attempt(site, url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    tracing::warn!(
                        site = %site.name,
                        %url,
                        attempt = attempt + 1,
                        error = %e,
                        "Request failed"
                    );
                    last_error = Some(e);
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                    }
                }
            }
        }

        tracing::error!(site = %site.name, %url, "All retry attempts failed");
        Err(last_error.unwrap_or_else(|| AppError::NetworkError(format!("Fetch failed: {url}"))))
    }
}

/// How far into the body the non-ASCII sniff looks.
const SNIFF_LEN: usize = 1024;

/// Decode a response body using the charset from `Content-Type`.
///
/// When no usable charset is declared, a scan of the first bytes decides:
/// bodies with non-ASCII content that are not valid UTF-8 are treated as
/// windows-1252 (the common legacy single-byte case); everything else
/// decodes as UTF-8.
fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(|ct| {
            ct.split(';')
                .find_map(|part| part.trim().strip_prefix("charset="))
        })
        .map(|label| label.trim_matches('"'))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or_else(|| sniff_encoding(bytes));

    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Pick an encoding for an undeclared body by inspecting its first bytes.
fn sniff_encoding(bytes: &[u8]) -> &'static Encoding {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    if head.iter().any(|b| !b.is_ascii()) && std::str::from_utf8(bytes).is_err() {
        return WINDOWS_1252;
    }
    UTF_8
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Validate a URL to prevent server-side request forgery (SSRF).
///
/// 1. Only allow `http` and `https` schemes.
/// 2. Resolve the hostname via DNS.
/// 3. Reject if any resolved IP is private/reserved.
async fn validate_url(url: &str) -> Result<(), AppError> {
    let parsed = Url::parse(url).map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::HttpError(format!(
                "URL scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| AppError::HttpError("URL has no host".to_string()))?;

    // IP literals are checked directly, hostnames via DNS.
    if let Ok(ip) = host.parse::<IpAddr>() {
        if is_private_ip(ip) {
            return Err(AppError::HttpError(format!(
                "SSRF blocked: {host} resolves to private/reserved IP"
            )));
        }
        return Ok(());
    }

    let port = parsed.port().unwrap_or(match parsed.scheme() {
        "https" => 443,
        _ => 80,
    });
    let addrs: Vec<_> = tokio::net::lookup_host(format!("{host}:{port}"))
        .await
        .map_err(|e| AppError::NetworkError(format!("DNS resolution failed for {host}: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(AppError::NetworkError(format!(
            "DNS resolution returned no addresses for {host}"
        )));
    }

    for socket_addr in &addrs {
        if is_private_ip(socket_addr.ip()) {
            return Err(AppError::HttpError(format!(
                "SSRF blocked: {host} resolves to private/reserved IP {}",
                socket_addr.ip()
            )));
        }
    }

    Ok(())
}

/// Check if an IP address is in a private/reserved/link-local range.
fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local() // 169.254.0.0/16 (cloud metadata!)
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64 // CGN
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fe80::/10 (link-local)
                || (v6.segments()[0] & 0xFFC0) == 0xFE80
                // fc00::/7 (unique local)
                || (v6.segments()[0] & 0xFE00) == 0xFC00
                // IPv4-mapped IPv6 — check the embedded v4
                || match v6.to_ipv4_mapped() {
                    Some(v4) => is_private_ip(IpAddr::V4(v4)),
                    None => false,
                }
        }
    }
}
