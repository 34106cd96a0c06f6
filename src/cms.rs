//! Legacy CMS image listing, used as an alternative or additional source.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, Url};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::{Cms, Http};

/// What the CMS login flow needs from a response.
#[derive(Debug, Clone)]
pub struct CmsResponse {
    pub status: u16,
    /// URL after redirects.
    pub final_url: Url,
    pub body: Vec<u8>,
}

/// Cookie-keeping HTTP session the CMS client talks through.
#[async_trait]
pub trait CmsSession: Send + Sync {
    async fn get(&self, url: &Url) -> Result<CmsResponse>;

    async fn post_form(
        &self,
        url: &Url,
        referer: &str,
        form: &[(&str, &str)],
    ) -> Result<CmsResponse>;

    /// Value of cookie `name` as it would be sent to `url`.
    fn cookie(&self, url: &Url, name: &str) -> Option<String>;
}

/// reqwest client with a cookie jar.
pub struct ReqwestSession {
    http: Client,
    jar: Arc<Jar>,
}

impl ReqwestSession {
    pub fn new(http_cfg: &Http) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let http = Client::builder()
            .user_agent(http_cfg.user_agent.clone())
            .timeout(http_cfg.timeout())
            .cookie_provider(jar.clone())
            .build()
            .context("failed to build CMS client")?;
        Ok(Self { http, jar })
    }

    async fn read(res: reqwest::Response) -> Result<CmsResponse> {
        let status = res.status().as_u16();
        let final_url = res.url().clone();
        let body = res.bytes().await.context("failed to read CMS response")?;
        Ok(CmsResponse {
            status,
            final_url,
            body: body.to_vec(),
        })
    }
}

#[async_trait]
impl CmsSession for ReqwestSession {
    async fn get(&self, url: &Url) -> Result<CmsResponse> {
        let res = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("failed to reach {}", url))?;
        Self::read(res).await
    }

    async fn post_form(
        &self,
        url: &Url,
        referer: &str,
        form: &[(&str, &str)],
    ) -> Result<CmsResponse> {
        let res = self
            .http
            .post(url.clone())
            .header("Referer", referer)
            .form(form)
            .send()
            .await
            .with_context(|| format!("failed to post to {}", url))?;
        Self::read(res).await
    }

    fn cookie(&self, url: &Url, name: &str) -> Option<String> {
        self.jar
            .cookies(url)
            .and_then(|h| h.to_str().ok().map(str::to_string))
            .and_then(|h| cookie_value(&h, name))
    }
}

pub struct CmsClient {
    session: Arc<dyn CmsSession>,
    base_url: Url,
    authenticated: bool,
}

impl fmt::Debug for CmsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CmsClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.authenticated)
            .finish_non_exhaustive()
    }
}

impl CmsClient {
    pub fn new(base_url: &str, session: Arc<dyn CmsSession>) -> Result<Self> {
        let mut base_url = Url::parse(base_url).context("invalid CMS base URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            session,
            base_url,
            authenticated: false,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Session login: fetch the login page for its CSRF cookie, then post the
    /// credentials. Success means a 200 that did not land back on a login URL.
    #[instrument(skip_all)]
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<bool> {
        let login_url = self.base_url.join("cms/login/")?;
        self.session
            .get(&login_url)
            .await
            .context("failed to reach CMS login page")?;

        let csrf = self
            .session
            .cookie(&login_url, "csrftoken")
            .unwrap_or_default();

        let res = self
            .session
            .post_form(
                &login_url,
                login_url.as_str(),
                &[
                    ("username", username),
                    ("password", password),
                    ("csrfmiddlewaretoken", csrf.as_str()),
                ],
            )
            .await
            .context("failed to post CMS login")?;

        self.authenticated = login_succeeded(res.status, &res.final_url);
        if self.authenticated {
            info!("authenticated with CMS");
        } else {
            warn!(status = res.status, "CMS authentication failed");
        }
        Ok(self.authenticated)
    }

    /// Image download URLs listed by the CMS images API.
    #[instrument(skip_all)]
    pub async fn list_images(&self) -> Result<Vec<String>> {
        if !self.authenticated {
            return Err(anyhow!("not authenticated with CMS"));
        }
        let api = self.base_url.join("api/v2/images/")?;
        let res = self
            .session
            .get(&api)
            .await
            .context("failed to reach CMS images API")?;
        if !(200..300).contains(&res.status) {
            return Err(anyhow!("CMS images API error {}", res.status));
        }
        let body: Value = serde_json::from_slice(&res.body).context("invalid CMS images JSON")?;
        let images = parse_image_listing(&body, &self.base_url);
        info!(count = images.len(), "found images in CMS");
        Ok(images)
    }
}

/// Log in and list images; any failure yields an empty list.
pub async fn fetch_cms_images(cms: &Cms, session: Arc<dyn CmsSession>) -> Vec<String> {
    if !cms.has_credentials() {
        warn!("CMS source selected but no credentials configured");
        return Vec::new();
    }
    match try_fetch(cms, session).await {
        Ok(images) => images,
        Err(err) => {
            warn!(?err, "error fetching CMS images");
            Vec::new()
        }
    }
}

async fn try_fetch(cms: &Cms, session: Arc<dyn CmsSession>) -> Result<Vec<String>> {
    let mut client = CmsClient::new(&cms.base_url, session)?;
    if !client.authenticate(&cms.username, &cms.password).await? {
        return Ok(Vec::new());
    }
    client.list_images().await
}

fn login_succeeded(status: u16, final_url: &Url) -> bool {
    status == 200 && !final_url.as_str().to_lowercase().contains("login")
}

fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

/// `items[].meta.download_url`, falling back to `<base>` + `items[].file`.
pub fn parse_image_listing(body: &Value, base_url: &Url) -> Vec<String> {
    let Some(items) = body.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };
    let base = base_url.as_str().trim_end_matches('/');
    items
        .iter()
        .filter_map(|item| {
            if let Some(url) = item
                .get("meta")
                .and_then(|m| m.get("download_url"))
                .and_then(Value::as_str)
            {
                return Some(url.to_string());
            }
            item.get("file")
                .and_then(Value::as_str)
                .map(|file| format!("{}{}", base, file))
        })
        .collect()
}
