//! Historical price lookup for price feed pairs.
//!
//! Two strategies are available, chosen per deployment:
//!
//! - [`StreamingFeed`] - websocket subscription that keeps the last hour of
//!   samples per pair in a [`PriceCache`]
//! - [`RestFeed`] - on-demand query of the one-minute window ending at the
//!   requested instant
//!
//! [`PriceOracle`] wraps either one and inverts the pairs quoted in the
//! opposite direction to the synthetic's natural quote. A streaming oracle
//! may fall back to a single-quote REST lookup when the cache has no sample,
//! which is the case right after startup and after every reconnect.
//!
//! A missing price is not an error: it means the market was closed at that
//! instant and the request must be rejected.

mod cache;
mod rest;
mod stream;

use std::{collections::HashSet, future::Future};

use fastnum::{UD128, decimal::Context};
use tracing::debug;

pub use cache::{PriceCache, RETENTION, SWEEP_INTERVAL};
pub use rest::RestFeed;
pub use stream::{RECONNECT_DELAY, StreamingFeed};

use crate::{error::PriceFeedError, types::Timestamp};

/// Pairs quoted in inverted form by default.
pub const DEFAULT_REVERSED_PAIRS: &[&str] = &["USDCHF"];

/// Point-in-time price of a pair.
#[derive(Clone, Copy, derive_more::Debug, PartialEq, Eq)]
pub struct PriceQuote {
    #[debug("{value}")]
    pub value: UD128,
    pub as_of: Timestamp,
}

/// Source of historical prices.
pub trait PriceSource: Send + Sync {
    /// Price of `pair` at or before `at`.
    ///
    /// Returns `Ok(None)` when no price is available (market closed).
    fn price_at(
        &self,
        pair: &str,
        at: Timestamp,
    ) -> impl Future<Output = Result<Option<PriceQuote>, PriceFeedError>> + Send;
}

/// Set of pair identifiers whose upstream quote must be inverted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReversedPairs(HashSet<String>);

impl Default for ReversedPairs {
    fn default() -> Self {
        Self::new(DEFAULT_REVERSED_PAIRS.iter().copied())
    }
}

impl ReversedPairs {
    pub fn new<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(pairs.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, pair: &str) -> bool {
        self.0.contains(pair)
    }

    /// Applies the quote direction convention to an upstream quote.
    ///
    /// Zero quotes are treated as unavailable.
    pub fn normalize(&self, pair: &str, quote: PriceQuote) -> Option<PriceQuote> {
        if quote.value == UD128::ZERO {
            return None;
        }
        if self.contains(pair) {
            Some(PriceQuote {
                value: UD128::ONE / quote.value,
                as_of: quote.as_of,
            })
        } else {
            Some(quote)
        }
    }
}

/// Strategy used to obtain raw quotes.
#[derive(Debug)]
pub enum FeedStrategy {
    Streaming(StreamingFeed),
    Rest(RestFeed),
}

/// Price lookup with reversed pair handling.
#[derive(Debug)]
pub struct PriceOracle {
    strategy: FeedStrategy,
    reversed: ReversedPairs,
    fallback: Option<RestFeed>,
}

impl PriceOracle {
    pub fn new(strategy: FeedStrategy, reversed: ReversedPairs) -> Self {
        Self {
            strategy,
            reversed,
            fallback: None,
        }
    }

    /// Queries `fallback` for a point quote when the streaming cache misses.
    pub fn with_fallback(mut self, fallback: RestFeed) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn strategy(&self) -> &FeedStrategy {
        &self.strategy
    }

    /// Stops background ingestion, if any.
    pub fn shutdown(&self) {
        if let FeedStrategy::Streaming(feed) = &self.strategy {
            feed.stop();
        }
    }
}

impl PriceSource for PriceOracle {
    async fn price_at(
        &self,
        pair: &str,
        at: Timestamp,
    ) -> Result<Option<PriceQuote>, PriceFeedError> {
        let raw = match &self.strategy {
            FeedStrategy::Streaming(feed) => match (feed.latest_at(pair, at), &self.fallback) {
                (None, Some(rest)) => {
                    debug!(pair, at, "no cached price, querying feed");
                    rest.point_price(pair, at).await?
                }
                (cached, _) => cached,
            },
            FeedStrategy::Rest(feed) => feed.window_close(pair, at).await?,
        };
        Ok(raw.and_then(|quote| self.reversed.normalize(pair, quote)))
    }
}

/// Parses a JSON number into a price without going through floats.
pub(crate) fn parse_price(value: &serde_json::Number) -> Result<UD128, PriceFeedError> {
    UD128::from_str(&value.to_string(), Context::default())
        .map_err(|_| PriceFeedError::InvalidPrice(value.to_string()))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use fastnum::udec128;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };
    use url::Url;

    use super::*;

    /// Answers a single HTTP request with a JSON `body`, yielding the request line.
    async fn serve_once(body: &'static str) -> (Url, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let read = socket.read(&mut buf).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..read]);
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request)
                .lines()
                .next()
                .unwrap_or_default()
                .to_owned()
        });
        (url, server)
    }

    fn oracle_with(samples: &[(&str, Timestamp, UD128)]) -> PriceOracle {
        let cache = Arc::new(PriceCache::new());
        for (pair, at, price) in samples {
            cache.insert(pair, *at, *price);
        }
        PriceOracle::new(
            FeedStrategy::Streaming(StreamingFeed::detached(cache)),
            ReversedPairs::default(),
        )
    }

    #[tokio::test]
    async fn test_reversed_pair_is_inverted() {
        let oracle = oracle_with(&[("USDCHF", 100, udec128!(0.8)), ("EURUSD", 100, udec128!(1.2))]);

        let chf = oracle.price_at("USDCHF", 150).await.unwrap().unwrap();
        assert_eq!(chf.value, udec128!(1.25));
        assert_eq!(chf.as_of, 100);

        let eur = oracle.price_at("EURUSD", 150).await.unwrap().unwrap();
        assert_eq!(eur.value, udec128!(1.2));
    }

    #[tokio::test]
    async fn test_missing_sample_is_unavailable() {
        let oracle = oracle_with(&[("EURUSD", 200, udec128!(1.2))]);

        assert_eq!(oracle.price_at("EURUSD", 199).await.unwrap(), None);
        assert_eq!(oracle.price_at("GBPUSD", 500).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cache_miss_falls_back_to_point_price() {
        let (url, server) = serve_once(r#"{"price": 0.8, "t": 990}"#).await;
        let oracle =
            oracle_with(&[]).with_fallback(RestFeed::new(&url, Duration::from_secs(5)).unwrap());

        let quote = oracle.price_at("USDCHF", 1000).await.unwrap().unwrap();
        assert_eq!(quote.value, udec128!(1.25));
        assert_eq!(quote.as_of, 990);
        assert_eq!(
            server.await.unwrap(),
            "GET /price?pair=USDCHF&timestamp=1000 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn test_fallback_without_quote_is_unavailable() {
        let (url, server) = serve_once(r#"{"price": null}"#).await;
        let oracle =
            oracle_with(&[]).with_fallback(RestFeed::new(&url, Duration::from_secs(5)).unwrap());

        assert_eq!(oracle.price_at("EURUSD", 1000).await.unwrap(), None);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_cache_hit_skips_fallback() {
        let unreachable = RestFeed::new(
            &Url::parse("http://127.0.0.1:1").unwrap(),
            Duration::from_secs(5),
        )
        .unwrap();
        let oracle = oracle_with(&[("EURUSD", 100, udec128!(1.2))]).with_fallback(unreachable);

        assert_eq!(
            oracle.price_at("EURUSD", 150).await.unwrap().map(|q| q.value),
            Some(udec128!(1.2))
        );
        // Only a miss reaches the fallback
        assert!(matches!(
            oracle.price_at("EURUSD", 50).await,
            Err(PriceFeedError::Http(_))
        ));
    }

    #[test]
    fn test_zero_quote_is_unavailable() {
        let reversed = ReversedPairs::default();
        let quote = PriceQuote {
            value: UD128::ZERO,
            as_of: 1,
        };
        assert_eq!(reversed.normalize("USDCHF", quote), None);
        assert_eq!(reversed.normalize("EURUSD", quote), None);
    }

    #[test]
    fn test_custom_reversed_pairs() {
        let reversed = ReversedPairs::new(["USDJPY"]);
        assert!(reversed.contains("USDJPY"));
        assert!(!reversed.contains("USDCHF"));
    }

    #[test]
    fn test_parse_price_from_json_number() {
        let number: serde_json::Number = serde_json::from_str("1.18745").unwrap();
        assert_eq!(parse_price(&number).unwrap(), udec128!(1.18745));

        let negative: serde_json::Number = serde_json::from_str("-1").unwrap();
        assert!(parse_price(&negative).is_err());
    }
}
