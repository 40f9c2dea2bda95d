//! Movie metadata lookup against the OMDb API.

use crate::model::MovieMetadata;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_KEY_VAR: &str = "OMDB_API_KEY";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("movie title cannot be empty")]
    EmptyTitle,

    #[error("API key variable {0} is not set, check your .env file")]
    MissingApiKey(String),

    #[error("request to the movie API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("movie API rejected the API key")]
    Unauthorized,

    #[error("movie API returned status {0}")]
    BadStatus(u16),

    #[error("could not decode movie API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unexpected value in movie API response: {0}")]
    BadField(String),

    #[error("no movie titled '{0}'")]
    NotFound(String),
}

#[async_trait]
pub trait MovieLookup: Send + Sync {
    async fn fetch_movie(&self, title: &str) -> Result<MovieMetadata, LookupError>;
}

#[derive(Debug, Deserialize)]
struct OmdbResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Error")]
    error: Option<String>,
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "Director")]
    director: Option<String>,
    #[serde(rename = "Poster")]
    poster: Option<String>,
}

impl OmdbResponse {
    fn into_metadata(self, title: &str) -> Result<MovieMetadata, LookupError> {
        if !self.response.eq_ignore_ascii_case("true") {
            return match self.error {
                Some(e) if e.to_ascii_lowercase().contains("api key") => {
                    Err(LookupError::Unauthorized)
                }
                _ => Err(LookupError::NotFound(title.to_owned())),
            };
        }
        Ok(MovieMetadata {
            year: parse_year(self.year.as_deref().unwrap_or("N/A"))?,
            rating: parse_rating(self.imdb_rating.as_deref().unwrap_or("N/A"))?,
            director: self.director.unwrap_or_default(),
            poster: self.poster.unwrap_or_default(),
        })
    }
}

/// Series report ranges such as "2008–2013"; the first year is kept.
fn parse_year(raw: &str) -> Result<i32, LookupError> {
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return if raw == "N/A" {
            Ok(0)
        } else {
            Err(LookupError::BadField(format!("year '{}'", raw)))
        };
    }
    digits
        .parse()
        .map_err(|_| LookupError::BadField(format!("year '{}'", raw)))
}

fn parse_rating(raw: &str) -> Result<f64, LookupError> {
    if raw == "N/A" {
        return Ok(0.0);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|r| r.is_finite())
        .ok_or_else(|| LookupError::BadField(format!("rating '{}'", raw)))
}

pub struct OmdbClient {
    client: reqwest::Client,
    base_url: String,
    api_key_var: String,
}

impl OmdbClient {
    pub fn new(base_url: &str, api_key_var: &str) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .https_only(base_url.starts_with("https://"))
            .build()?;
        Ok(OmdbClient {
            client,
            base_url: base_url.to_owned(),
            api_key_var: api_key_var.to_owned(),
        })
    }

    fn api_key(&self) -> Result<String, LookupError> {
        std::env::var(&self.api_key_var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LookupError::MissingApiKey(self.api_key_var.clone()))
    }
}

#[async_trait]
impl MovieLookup for OmdbClient {
    async fn fetch_movie(&self, title: &str) -> Result<MovieMetadata, LookupError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(LookupError::EmptyTitle);
        }
        let key = self.api_key()?;

        debug!("looking up '{}'", title);
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("t", title), ("apikey", key.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => return Err(LookupError::Unauthorized),
            status => {
                warn!("movie API answered {} for '{}'", status, title);
                return Err(LookupError::BadStatus(status.as_u16()));
            }
        }

        let body = response.text().await?;
        let parsed: OmdbResponse = serde_json::from_str(&body)?;
        parsed.into_metadata(title)
    }
}
