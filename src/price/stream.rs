use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use super::{PriceCache, PriceQuote, RETENTION, SWEEP_INTERVAL, parse_price};
use crate::{error::PriceFeedError, types::Timestamp};

/// Delay between losing the feed connection and reconnecting.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Websocket price subscription backed by a [`PriceCache`].
///
/// Ingestion and eviction run as background tasks which are aborted on
/// [`StreamingFeed::stop`] or drop.
#[derive(derive_more::Debug)]
pub struct StreamingFeed {
    cache: Arc<PriceCache>,
    #[debug(skip)]
    tasks: Vec<JoinHandle<()>>,
}

impl StreamingFeed {
    /// Subscribes to `pairs` at `base_url` and starts ingestion.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        base_url: &Url,
        pairs: &[String],
        cache: Arc<PriceCache>,
    ) -> Result<Self, PriceFeedError> {
        let url = subscribe_url(base_url, pairs)?;
        info!(%url, pairs = pairs.len(), "starting price stream");

        let tasks = vec![
            tokio::spawn(run_ingestion(url, cache.clone())),
            tokio::spawn(run_eviction(cache.clone())),
        ];
        Ok(Self { cache, tasks })
    }

    /// Feed over an externally populated cache, with no background tasks.
    pub fn detached(cache: Arc<PriceCache>) -> Self {
        Self {
            cache,
            tasks: Vec::new(),
        }
    }

    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }

    /// Raw quote at or before `at`.
    pub fn latest_at(&self, pair: &str, at: Timestamp) -> Option<PriceQuote> {
        self.cache.latest_at(pair, at)
    }

    pub fn stop(&self) {
        self.tasks.iter().for_each(JoinHandle::abort);
    }
}

impl Drop for StreamingFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Websocket subscription endpoint for the given pairs.
pub(crate) fn subscribe_url(base_url: &Url, pairs: &[String]) -> Result<Url, PriceFeedError> {
    let base = base_url.as_str().trim_end_matches('/');
    let base = match base.strip_prefix("http") {
        Some(rest) => format!("ws{rest}"),
        None => base.to_owned(),
    };
    Ok(Url::parse(&format!(
        "{base}/subscribe?pairs={}",
        pairs.join(",")
    ))?)
}

async fn run_ingestion(url: Url, cache: Arc<PriceCache>) {
    loop {
        match ingest(&url, &cache).await {
            Ok(()) => info!("price stream closed"),
            Err(err) => warn!(%err, "price stream failed"),
        }
        // Samples may be missing for the disconnected interval
        cache.clear();
        info!(delay = ?RECONNECT_DELAY, "reconnecting price stream");
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn ingest(url: &Url, cache: &PriceCache) -> Result<(), PriceFeedError> {
    let (mut ws, _) = connect_async(url.as_str()).await?;
    info!("price stream connected");

    while let Some(message) = ws.next().await {
        match message? {
            Message::Text(text) => match apply_message(cache, &text) {
                Ok(updated) => debug!(updated, "price update"),
                Err(err) => debug!(%err, "ignoring price message"),
            },
            Message::Close(frame) => {
                debug!(?frame, "price stream close frame");
                break;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Applies a feed message to the cache, returning the number of samples
/// recorded.
///
/// Live updates carry a numeric `t` timestamp and one numeric field per
/// pair. Other messages are ignored, as are pairs with an invalid price.
pub(crate) fn apply_message(cache: &PriceCache, text: &str) -> Result<usize, PriceFeedError> {
    let message: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)?;
    let Some(at) = message.get("t").and_then(serde_json::Value::as_u64) else {
        return Ok(0);
    };

    let mut updated = 0;
    for (pair, value) in &message {
        let serde_json::Value::Number(number) = value else {
            continue;
        };
        if pair == "t" {
            continue;
        }
        match parse_price(number) {
            Ok(price) => {
                cache.insert(pair, at, price);
                updated += 1;
            }
            Err(err) => debug!(pair, %err, "skipping price"),
        }
    }
    Ok(updated)
}

async fn run_eviction(cache: Arc<PriceCache>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    interval.tick().await;
    loop {
        interval.tick().await;
        let cutoff = now().saturating_sub(RETENTION.as_secs());
        let removed = cache.prune_before(cutoff);
        debug!(removed, cutoff, "evicted expired prices");
    }
}

fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use fastnum::udec128;
    use futures::SinkExt;
    use tokio::{net::TcpListener, time::Instant};
    use tokio_tungstenite::accept_async;

    use super::*;

    #[test]
    fn test_subscribe_url() {
        let pairs = vec!["EURUSD".to_owned(), "GBPUSD".to_owned()];

        let url = subscribe_url(&Url::parse("https://prices.example.com/v1/").unwrap(), &pairs)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "wss://prices.example.com/v1/subscribe?pairs=EURUSD,GBPUSD"
        );

        let url = subscribe_url(&Url::parse("http://localhost:8080").unwrap(), &pairs).unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.query(), Some("pairs=EURUSD,GBPUSD"));
    }

    #[test]
    fn test_apply_live_update() {
        let cache = PriceCache::new();
        let updated =
            apply_message(&cache, r#"{"t": 1600000000, "EURUSD": 1.18745, "USDCHF": 0.91}"#)
                .unwrap();

        assert_eq!(updated, 2);
        assert_eq!(
            cache.latest_at("EURUSD", 1600000000).map(|q| q.value),
            Some(udec128!(1.18745))
        );
        assert_eq!(
            cache.latest_at("USDCHF", 1600000001).map(|q| q.value),
            Some(udec128!(0.91))
        );
    }

    #[test]
    fn test_apply_ignores_non_updates() {
        let cache = PriceCache::new();

        assert_eq!(apply_message(&cache, r#"{"status": "subscribed"}"#).unwrap(), 0);
        assert_eq!(apply_message(&cache, r#"{"t": "soon", "EURUSD": 1.2}"#).unwrap(), 0);
        assert_eq!(
            apply_message(&cache, r#"{"t": 100, "EURUSD": 1.2, "note": "x"}"#).unwrap(),
            1
        );
        assert!(apply_message(&cache, "not json").is_err());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalid_price_skips_only_that_pair() {
        let cache = PriceCache::new();
        let updated =
            apply_message(&cache, r#"{"t": 100, "EURUSD": -1.2, "GBPUSD": 1.3}"#).unwrap();

        assert_eq!(updated, 1);
        assert_eq!(cache.latest_at("EURUSD", 100), None);
        assert_eq!(
            cache.latest_at("GBPUSD", 100).map(|q| q.value),
            Some(udec128!(1.3))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_clears_cache_after_delay() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        let cache = Arc::new(PriceCache::new());
        let ingestion = tokio::spawn(run_ingestion(
            subscribe_url(&base, &["EURUSD".to_owned()]).unwrap(),
            cache.clone(),
        ));

        let (socket, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(socket).await.unwrap();
        ws.send(Message::Text(r#"{"t": 1600000000, "EURUSD": 1.2}"#.into()))
            .await
            .unwrap();
        while cache.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        ws.close(None).await.unwrap();
        let closed = Instant::now();

        let (_socket, _) = listener.accept().await.unwrap();
        assert!(closed.elapsed() >= RECONNECT_DELAY);
        assert!(cache.is_empty());
        ingestion.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_sweeps_expired_samples() {
        let cache = Arc::new(PriceCache::new());
        let fresh = now();
        cache.insert("EURUSD", fresh - 2 * RETENTION.as_secs(), udec128!(1.1));
        cache.insert("EURUSD", fresh, udec128!(1.2));
        let eviction = tokio::spawn(run_eviction(cache.clone()));

        tokio::time::sleep(SWEEP_INTERVAL / 2).await;
        assert_eq!(cache.len(), 2);

        tokio::time::sleep(SWEEP_INTERVAL / 2 + Duration::from_secs(1)).await;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.latest_at("EURUSD", fresh).map(|q| q.as_of), Some(fresh));
        eviction.abort();
    }

    #[tokio::test]
    async fn test_stop_aborts_tasks() {
        let mut feed = StreamingFeed::start(
            &Url::parse("http://127.0.0.1:1").unwrap(),
            &["EURUSD".to_owned()],
            Arc::new(PriceCache::new()),
        )
        .unwrap();
        feed.stop();
        for task in feed.tasks.drain(..) {
            assert!(task.await.unwrap_err().is_cancelled());
        }
    }
}
