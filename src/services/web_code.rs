use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::entity::prelude::*;

pub const DEFAULT_MIRRORS: [&str; 2] = ["https://wiralis.ru", "https://wiralis.online"];
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const GENERATE_CODE_PATH: &str = "api/bot/generate-code";
const API_KEY_HEADER: &str = "X-API-Key";

/// Identity sent to the site to issue a login code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebCodeRequest {
    pub telegram_id: i64,
    pub nickname: String,
    pub username: Option<String>,
    pub quote: Option<String>,
    pub bot_id: String,
}

impl From<&UserModel> for WebCodeRequest {
    fn from(user: &UserModel) -> Self {
        Self {
            telegram_id: user.telegram_id,
            nickname: user.nickname.clone(),
            username: user.username.clone(),
            quote: user.quote.clone(),
            bot_id: user.bot_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebCodeResponse {
    pub code: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorResponse {
    pub status: u16,
    pub body: String,
}

/// Failure before any HTTP status was received. Always worth trying the next mirror.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum WebCodeError {
    #[error("mirror rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("mirror answered with malformed body: {0}")]
    InvalidResponse(String),
    #[error("no mirror is reachable")]
    ConnectionFailed,
}

#[async_trait]
pub trait MirrorTransport: Send + Sync {
    async fn post(
        &self,
        endpoint: &Url,
        secret: &str,
        payload: &WebCodeRequest,
    ) -> Result<MirrorResponse, TransportError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl MirrorTransport for ReqwestTransport {
    async fn post(
        &self,
        endpoint: &Url,
        secret: &str,
        payload: &WebCodeRequest,
    ) -> Result<MirrorResponse, TransportError> {
        let response = self
            .client
            .post(endpoint.clone())
            .header(API_KEY_HEADER, secret)
            .json(payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(MirrorResponse { status, body })
    }
}

pub struct WebCodeService<T = ReqwestTransport> {
    mirrors: Vec<Url>,
    endpoints: Vec<Url>,
    secret: String,
    transport: T,
}

impl<T: MirrorTransport> WebCodeService<T> {
    pub fn new(mirrors: Vec<Url>, secret: String, transport: T) -> anyhow::Result<Self> {
        if mirrors.is_empty() {
            anyhow::bail!("At least one web mirror is required");
        }

        let endpoints = mirrors
            .iter()
            .map(Self::endpoint)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            mirrors,
            endpoints,
            secret,
            transport,
        })
    }

    fn endpoint(mirror: &Url) -> Result<Url, url::ParseError> {
        let base = mirror.as_str().trim_end_matches('/');

        Url::parse(&format!("{base}/{GENERATE_CODE_PATH}"))
    }

    /// Site opened by the "open site" button
    pub fn primary_mirror(&self) -> &Url {
        &self.mirrors[0]
    }

    /// Tries mirrors in order. Only unreachable mirrors are skipped: any HTTP
    /// answer from a mirror is final.
    #[tracing::instrument(skip_all, fields(telegram_id = payload.telegram_id))]
    pub async fn request_code(
        &self,
        payload: &WebCodeRequest,
    ) -> Result<WebCodeResponse, WebCodeError> {
        for endpoint in &self.endpoints {
            tracing::info!(mirror = %endpoint, "Requesting web code");

            let response = match self.transport.post(endpoint, &self.secret, payload).await {
                Ok(response) => response,
                Err(err) => {
                    tracing::warn!(mirror = %endpoint, err = %err, "Mirror is unreachable");
                    continue;
                },
            };

            if response.status != StatusCode::OK.as_u16() {
                tracing::error!(
                    mirror = %endpoint,
                    status = response.status,
                    body = %response.body,
                    "Mirror rejected web code request"
                );

                return Err(WebCodeError::Rejected {
                    status: response.status,
                    body: response.body,
                });
            }

            return serde_json::from_str(&response.body).map_err(|err| {
                tracing::error!(mirror = %endpoint, err = %err, "Malformed web code response");

                WebCodeError::InvalidResponse(err.to_string())
            });
        }

        tracing::error!(mirrors = ?self.endpoints, "All web mirrors are unreachable");

        Err(WebCodeError::ConnectionFailed)
    }
}

/// Expiry as `HH:MM`, `fallback` when it can't be read.
///
/// Zoned timestamps are converted into `tz` (the bot passes the server's `Local`) instead of
/// keeping the offset they carry. Naive timestamps are shown as written.
pub fn expires_text<Tz>(raw: Option<&str>, tz: &Tz, fallback: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let Some(raw) = raw.map(str::trim) else {
        return fallback.to_owned();
    };

    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return time.with_timezone(tz).format("%H:%M").to_string();
    }

    if let Ok(time) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return time.format("%H:%M").to_string();
    }

    fallback.to_owned()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use chrono::{FixedOffset, Utc};

    use super::*;

    type Scripted = Result<MirrorResponse, TransportError>;

    #[derive(Default)]
    struct ScriptedTransport {
        script: Mutex<VecDeque<Scripted>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedTransport {
        fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                calls: Mutex::default(),
            }
        }
    }

    #[async_trait]
    impl MirrorTransport for ScriptedTransport {
        async fn post(
            &self,
            endpoint: &Url,
            secret: &str,
            _payload: &WebCodeRequest,
        ) -> Result<MirrorResponse, TransportError> {
            self.calls
                .lock()
                .unwrap()
                .push((endpoint.to_string(), secret.to_owned()));

            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TransportError::Timeout))
        }
    }

    fn mirrors(n: usize) -> Vec<Url> {
        (1..=n)
            .map(|i| Url::parse(&format!("https://mirror{i}.test")).unwrap())
            .collect()
    }

    fn service(n: usize, script: Vec<Scripted>) -> WebCodeService<ScriptedTransport> {
        WebCodeService::new(mirrors(n), "secret".into(), ScriptedTransport::new(script)).unwrap()
    }

    fn payload() -> WebCodeRequest {
        WebCodeRequest {
            telegram_id: 42,
            nickname: "neo".into(),
            username: Some("neo".into()),
            quote: None,
            bot_id: "AB12".into(),
        }
    }

    fn ok(body: &str) -> Scripted {
        Ok(MirrorResponse {
            status: 200,
            body: body.into(),
        })
    }

    fn called(service: &WebCodeService<ScriptedTransport>) -> Vec<String> {
        service
            .transport
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(endpoint, _)| endpoint.clone())
            .collect()
    }

    #[test]
    fn payload_uses_site_field_names() {
        let json = serde_json::to_value(payload()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "telegramId": 42,
                "nickname": "neo",
                "username": "neo",
                "quote": null,
                "botId": "AB12",
            })
        );
    }

    #[test]
    fn endpoint_is_appended_to_mirror() {
        let service = service(1, vec![]);

        assert_eq!(
            service.endpoints[0].as_str(),
            "https://mirror1.test/api/bot/generate-code"
        );
        assert_eq!(service.primary_mirror().as_str(), "https://mirror1.test/");
    }

    #[test]
    fn mirrors_are_required() {
        assert!(
            WebCodeService::new(vec![], "secret".into(), ScriptedTransport::default()).is_err()
        );
    }

    #[tokio::test]
    async fn first_reachable_mirror_wins() {
        let service = service(
            4,
            vec![
                Err(TransportError::Timeout),
                Err(TransportError::Connect("refused".into())),
                ok(r#"{"code":"123456","expiresAt":"2024-10-01T12:30:00Z"}"#),
                ok(r#"{"code":"999999"}"#),
            ],
        );

        let response = service.request_code(&payload()).await.unwrap();

        assert_eq!(
            response,
            WebCodeResponse {
                code: "123456".into(),
                expires_at: Some("2024-10-01T12:30:00Z".into()),
            }
        );
        assert_eq!(
            called(&service),
            vec![
                "https://mirror1.test/api/bot/generate-code",
                "https://mirror2.test/api/bot/generate-code",
                "https://mirror3.test/api/bot/generate-code",
            ]
        );
    }

    #[tokio::test]
    async fn secret_is_sent_to_every_mirror() {
        let service = service(2, vec![Err(TransportError::Timeout), ok(r#"{"code":"1"}"#)]);

        service.request_code(&payload()).await.unwrap();

        assert!(service
            .transport
            .calls
            .lock()
            .unwrap()
            .iter()
            .all(|(_, secret)| secret == "secret"));
    }

    #[tokio::test]
    async fn all_unreachable_is_single_error() {
        let service = service(
            3,
            vec![
                Err(TransportError::Timeout),
                Err(TransportError::Connect("refused".into())),
                Err(TransportError::Request("reset".into())),
            ],
        );

        let err = service.request_code(&payload()).await.unwrap_err();

        assert_eq!(err, WebCodeError::ConnectionFailed);
        assert!(!err.to_string().contains("mirror1"));
        assert_eq!(called(&service).len(), 3);
    }

    #[tokio::test]
    async fn rejection_stops_failover() {
        let service = service(
            3,
            vec![
                Ok(MirrorResponse {
                    status: 403,
                    body: "bad key".into(),
                }),
                ok(r#"{"code":"123456"}"#),
            ],
        );

        let err = service.request_code(&payload()).await.unwrap_err();

        assert_eq!(
            err,
            WebCodeError::Rejected {
                status: 403,
                body: "bad key".into(),
            }
        );
        assert_eq!(called(&service).len(), 1);
    }

    #[tokio::test]
    async fn redirect_is_a_rejection() {
        let service = service(
            2,
            vec![Ok(MirrorResponse {
                status: 302,
                body: String::new(),
            })],
        );

        assert!(matches!(
            service.request_code(&payload()).await,
            Err(WebCodeError::Rejected { status: 302, .. })
        ));
        assert_eq!(called(&service).len(), 1);
    }

    #[tokio::test]
    async fn malformed_success_is_not_retried() {
        let service = service(2, vec![ok("<html>"), ok(r#"{"code":"1"}"#)]);

        assert!(matches!(
            service.request_code(&payload()).await,
            Err(WebCodeError::InvalidResponse(_))
        ));
        assert_eq!(called(&service).len(), 1);
    }

    #[test]
    fn expiry_in_local_time() {
        let moscow = FixedOffset::east_opt(3 * 3600).unwrap();

        assert_eq!(
            expires_text(Some("2024-10-01T12:30:00Z"), &moscow, "10 минут"),
            "15:30"
        );
        assert_eq!(
            expires_text(Some("2024-10-01T12:30:00.123+00:00"), &Utc, "10 минут"),
            "12:30"
        );
        assert_eq!(
            expires_text(Some("2024-10-01T08:05:00"), &moscow, "10 минут"),
            "08:05"
        );
    }

    #[test]
    fn expiry_ignores_its_own_offset() {
        assert_eq!(
            expires_text(Some("2024-10-01T15:30:00+03:00"), &Utc, "10 минут"),
            "12:30"
        );
    }

    #[test]
    fn expiry_falls_back() {
        for raw in [None, Some(""), Some("soon"), Some("2024-13-45T99:00:00Z")] {
            assert_eq!(expires_text(raw, &Utc, "10 минут"), "10 минут");
        }
    }
}
