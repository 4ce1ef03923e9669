//! Page driver backed by `reqwest`.
//!
//! Redirects are followed by hand so that cookies set on intermediate hops
//! (the identity broker sets most of them on 302s) land in the jar. The jar
//! is a plain list of [`Cookie`]s, which keeps domain and expiry available for
//! the session record.
//!
//! Section "scrolling" maps to the listing's `?page=N` pagination: every
//! [`PageDriver::load_more`] call fetches the next page and appends it to the
//! listing that was loaded last.

use crate::browser::form::{self, Activation, FormMethod, FormSubmission};
use crate::browser::{Page, PageDriver};
use crate::error::{BrowseError, NetworkError};
use crate::models::Cookie;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::{COOKIE, HeaderValue, LOCATION};
use reqwest::{Method, StatusCode, redirect};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const MAX_REDIRECTS: usize = 10;

#[derive(Debug)]
struct Listing {
    base: Url,
    next_page: u32,
    chunks: Vec<String>,
}

/// A [`PageDriver`] over HTTP.
#[derive(Debug)]
pub struct HttpDriver {
    client: reqwest::Client,
    jar: Vec<Cookie>,
    current: Option<Page>,
    listing: Option<Listing>,
}

impl HttpDriver {
    /// Build a driver whose every request is bounded by `page_timeout`.
    pub fn new(page_timeout: Duration) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(page_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| NetworkError::Request {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            jar: Vec::new(),
            current: None,
            listing: None,
        })
    }

    fn network_error(url: &Url, e: reqwest::Error) -> NetworkError {
        if e.is_timeout() {
            NetworkError::Timeout {
                url: url.to_string(),
            }
        } else {
            NetworkError::Request {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }

    fn store_cookies(&mut self, url: &Url, response: &reqwest::Response) {
        let host = url.host_str().unwrap_or_default();
        let now = Utc::now();
        for c in response.cookies() {
            let expires = c
                .max_age()
                .map(|age| now + TimeDelta::from_std(age).unwrap_or(TimeDelta::zero()))
                .or_else(|| c.expires().map(DateTime::<Utc>::from));
            let cookie = Cookie {
                name: c.name().to_string(),
                value: c.value().to_string(),
                domain: c
                    .domain()
                    .map(|d| d.trim_start_matches('.').to_string())
                    .unwrap_or_else(|| host.to_string()),
                path: c.path().unwrap_or("/").to_string(),
                expires,
                secure: c.secure(),
            };
            upsert_cookie(&mut self.jar, cookie, now);
        }
    }

    /// Issue a request, following redirects and collecting cookies on the way.
    #[instrument(level = "debug", skip_all, fields(%method, url = %url))]
    async fn fetch(
        &mut self,
        method: Method,
        url: Url,
        fields: Option<Vec<(String, String)>>,
    ) -> Result<Page, NetworkError> {
        let start = url.to_string();
        let (mut method, mut url, mut fields) = (method, url, fields);

        for hop in 0..=MAX_REDIRECTS {
            let mut request = self.client.request(method.clone(), url.clone());
            if let Some(header) = cookie_header(&self.jar, &url, Utc::now())
                .and_then(|h| HeaderValue::from_str(&h).ok())
            {
                request = request.header(COOKIE, header);
            }
            if let Some(pairs) = &fields {
                request = if method == Method::GET {
                    request.query(pairs)
                } else {
                    request.form(pairs)
                };
            }

            let response = request.send().await.map_err(|e| Self::network_error(&url, e))?;
            self.store_cookies(&url, &response);
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| NetworkError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    })?;
                let next = url
                    .join(location)
                    .map_err(|_| NetworkError::InvalidUrl(location.to_string()))?;
                debug!(hop, from = %url, to = %next, "Following redirect");
                if status != StatusCode::TEMPORARY_REDIRECT && status != StatusCode::PERMANENT_REDIRECT {
                    method = Method::GET;
                    fields = None;
                }
                url = next;
                continue;
            }

            if !status.is_success() {
                return Err(NetworkError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            let final_url = response.url().to_string();
            let html = response.text().await.map_err(|e| Self::network_error(&url, e))?;
            debug!(bytes = html.len(), "Loaded page");
            return Ok(Page::new(final_url, html));
        }

        warn!(url = %start, "Redirect limit reached");
        Err(NetworkError::TooManyRedirects { url: start })
    }

    fn land(&mut self, page: Page) -> Page {
        self.listing = Url::parse(&page.url).ok().map(|base| Listing {
            base,
            next_page: 2,
            chunks: vec![page.html.clone()],
        });
        self.current = Some(page.clone());
        page
    }

    async fn submit(&mut self, plan: FormSubmission) -> Result<Page, NetworkError> {
        let method = match plan.method {
            FormMethod::Get => Method::GET,
            FormMethod::Post => Method::POST,
        };
        let page = self.fetch(method, plan.action, Some(plan.fields)).await?;
        Ok(self.land(page))
    }
}

impl PageDriver for HttpDriver {
    async fn goto(&mut self, url: &str) -> Result<Page, NetworkError> {
        let parsed = Url::parse(url).map_err(|_| NetworkError::InvalidUrl(url.to_string()))?;
        let page = self.fetch(Method::GET, parsed, None).await?;
        Ok(self.land(page))
    }

    async fn reload(&mut self) -> Result<Page, NetworkError> {
        let url = self
            .current
            .as_ref()
            .map(|p| p.url.clone())
            .ok_or_else(|| NetworkError::InvalidUrl("no page loaded".to_string()))?;
        self.goto(&url).await
    }

    async fn load_more(&mut self) -> Result<Page, NetworkError> {
        let (base, page_no) = match &self.listing {
            Some(l) => (l.base.clone(), l.next_page),
            None => return Err(NetworkError::InvalidUrl("no listing loaded".to_string())),
        };
        let mut next = base.clone();
        next.query_pairs_mut().append_pair("page", &page_no.to_string());

        match self.fetch(Method::GET, next, None).await {
            Ok(page) => {
                if let Some(listing) = self.listing.as_mut() {
                    if !listing.chunks.contains(&page.html) {
                        listing.chunks.push(page.html);
                    }
                    listing.next_page += 1;
                }
            }
            Err(NetworkError::Status { status: 404, .. }) => {
                info!(url = %base, page = page_no, "Listing has no further pages");
            }
            Err(e) => return Err(e),
        }

        let html = self
            .listing
            .as_ref()
            .map(|l| l.chunks.join("\n"))
            .unwrap_or_default();
        let combined = Page::new(base.to_string(), html);
        self.current = Some(combined.clone());
        Ok(combined)
    }

    async fn fill_and_submit(&mut self, page: &Page, fields: &[(&str, &str)]) -> Result<Page, BrowseError> {
        let plan = form::plan_submission(page, fields)?;
        Ok(self.submit(plan).await?)
    }

    async fn activate(&mut self, page: &Page, selector: &str) -> Result<Page, BrowseError> {
        match form::plan_activation(page, selector)? {
            Activation::Follow(url) => Ok(self.goto(url.as_str()).await?),
            Activation::Submit(plan) => Ok(self.submit(plan).await?),
        }
    }

    fn cookies(&self) -> Vec<Cookie> {
        self.jar.clone()
    }

    fn set_cookies(&mut self, cookies: &[Cookie]) {
        self.jar = cookies.to_vec();
    }
}

/// Insert or replace a cookie; an already-expired cookie deletes its match.
fn upsert_cookie(jar: &mut Vec<Cookie>, cookie: Cookie, now: DateTime<Utc>) {
    jar.retain(|c| !(c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path));
    if !cookie.is_expired(now) {
        jar.push(cookie);
    }
}

/// The `Cookie` header value for a request to `url`, if any cookie applies.
fn cookie_header(jar: &[Cookie], url: &Url, now: DateTime<Utc>) -> Option<String> {
    let host = url.host_str()?;
    let path = url.path();
    let https = url.scheme() == "https";
    let pairs: Vec<String> = jar
        .iter()
        .filter(|c| c.matches_host(host) && !c.is_expired(now))
        .filter(|c| path.starts_with(&c.path))
        .filter(|c| https || !c.secure)
        .map(|c| format!("{}={}", c.name, c.value))
        .collect();
    (!pairs.is_empty()).then(|| pairs.join("; "))
}
