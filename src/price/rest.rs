use std::time::Duration;

use serde::{Deserialize, de::DeserializeOwned};
use tracing::warn;
use url::Url;

use super::{PriceQuote, parse_price};
use crate::{error::PriceFeedError, types::Timestamp};

/// Width of the history window ending at the requested instant.
const WINDOW: Timestamp = 60;

/// On-demand price lookups over HTTP.
///
/// [`RestFeed::window_close`] queries `GET {base}/history?symbol=..&resolution=1&from=..&to=..`
/// and answers with the last close of the returned window. [`RestFeed::point_price`] queries
/// `GET {base}/price?pair=..&timestamp=..` for a single quote.
#[derive(Clone, Debug)]
pub struct RestFeed {
    client: reqwest::Client,
    history_url: Url,
    price_url: Url,
}

/// One-minute candles; only closes are used.
#[derive(Debug, Deserialize)]
struct History {
    #[serde(default)]
    c: Vec<serde_json::Number>,
    #[serde(default)]
    t: Vec<Timestamp>,
}

/// Single quote; `price` is null when the feed has nothing for the instant.
#[derive(Debug, Deserialize)]
struct PointPrice {
    #[serde(default)]
    price: Option<serde_json::Number>,
    #[serde(default)]
    t: Option<Timestamp>,
}

impl RestFeed {
    /// A request exceeding `timeout` is treated as no price available.
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, PriceFeedError> {
        let base = base_url.as_str().trim_end_matches('/');
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            history_url: Url::parse(&format!("{base}/history"))?,
            price_url: Url::parse(&format!("{base}/price"))?,
        })
    }

    /// Raw close of `pair` within the minute ending at `at`.
    pub async fn window_close(
        &self,
        pair: &str,
        at: Timestamp,
    ) -> Result<Option<PriceQuote>, PriceFeedError> {
        let from = at.saturating_sub(WINDOW).to_string();
        let to = at.to_string();
        let query = [
            ("symbol", pair),
            ("resolution", "1"),
            ("from", from.as_str()),
            ("to", to.as_str()),
        ];
        match self.get::<History>(&self.history_url, &query, pair, at).await? {
            Some(history) => last_close(&history, at),
            None => Ok(None),
        }
    }

    /// Raw quote of `pair` at `at` as known to the feed.
    pub async fn point_price(
        &self,
        pair: &str,
        at: Timestamp,
    ) -> Result<Option<PriceQuote>, PriceFeedError> {
        let timestamp = at.to_string();
        let query = [("pair", pair), ("timestamp", timestamp.as_str())];
        match self.get::<PointPrice>(&self.price_url, &query, pair, at).await? {
            Some(point) => point_quote(&point, at),
            None => Ok(None),
        }
    }

    /// `Ok(None)` if the request timed out.
    async fn get<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, &str)],
        pair: &str,
        at: Timestamp,
    ) -> Result<Option<T>, PriceFeedError> {
        let response = match self.client.get(url.clone()).query(query).send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                warn!(pair, at, %url, "price feed timed out");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        if !response.status().is_success() {
            return Err(PriceFeedError::Status(response.status().as_u16()));
        }

        match response.json::<T>().await {
            Ok(body) => Ok(Some(body)),
            Err(err) if err.is_timeout() => {
                warn!(pair, at, %url, "price feed timed out");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Last close of the window, `None` if the window is empty.
fn last_close(history: &History, at: Timestamp) -> Result<Option<PriceQuote>, PriceFeedError> {
    let Some(close) = history.c.last() else {
        return Ok(None);
    };
    let as_of = match history.t.get(history.c.len() - 1) {
        Some(t) => (*t).min(at),
        None => at,
    };
    Ok(Some(PriceQuote {
        value: parse_price(close)?,
        as_of,
    }))
}

fn point_quote(point: &PointPrice, at: Timestamp) -> Result<Option<PriceQuote>, PriceFeedError> {
    let Some(price) = &point.price else {
        return Ok(None);
    };
    Ok(Some(PriceQuote {
        value: parse_price(price)?,
        as_of: point.t.map_or(at, |t| t.min(at)),
    }))
}
