//! Shared market feeds
//!
//! A [`SharedFeed`] multiplexes many topics over one session: each topic has
//! a route, and inbound envelopes are dispatched by their `dataType`. The
//! [`StreamRegistry`] keeps at most one live feed per endpoint.

use crate::bingx::types::Interval;
use crate::config::endpoints::redact_endpoint;
use crate::error::{BingxError, Result};
use crate::stream::kline::{kline_handler, kline_topic, WsKlineEvent};
use crate::stream::session::{self, SessionHandle};
use crate::stream::subscription::{read_topic, topic_handler, topic_key, ErrorSink, SubscriptionRequest};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Handler and error sink for one topic
///
/// Routes are shared out of the table so callbacks run without the table
/// lock held; a callback may call back into its feed.
struct Route {
    on_message: Mutex<Box<dyn FnMut(String) + Send>>,
    errors: ErrorSink,
}

impl Route {
    fn new(on_message: Box<dyn FnMut(String) + Send>, errors: ErrorSink) -> Arc<Self> {
        Arc::new(Self {
            on_message: Mutex::new(on_message),
            errors,
        })
    }
}

type Routes = Arc<Mutex<HashMap<String, Arc<Route>>>>;

/// A callback that panicked poisons the lock; the table itself stays valid
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn dispatch(routes: &Routes, text: String) {
    let topic = match read_topic(&text) {
        Ok(header) => header.data_type.unwrap_or_default(),
        Err(e) => {
            debug!(error = %e, "Dropping unroutable message");
            return;
        }
    };

    let route = lock(routes).get(&topic).cloned();
    match route {
        Some(route) => {
            let mut on_message = lock(&route.on_message);
            (on_message)(text)
        }
        None => debug!(topic = %topic, "No route for message"),
    }
}

fn broadcast(routes: &Routes, err: BingxError) {
    let sinks: Vec<ErrorSink> = lock(routes).values().map(|route| route.errors.clone()).collect();
    for sink in sinks {
        sink.report(err.clone());
    }
}

/// One session carrying any number of topics
pub struct SharedFeed {
    session: SessionHandle,
    routes: Routes,
}

impl SharedFeed {
    /// Dials `endpoint` with no topics attached
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
        let handler = {
            let routes = Arc::clone(&routes);
            move |text: String| dispatch(&routes, text)
        };
        let err_handler = {
            let routes = Arc::clone(&routes);
            move |err: BingxError| broadcast(&routes, err)
        };
        let session = session::serve(endpoint, None, handler, err_handler).await?;
        Ok(Self { session, routes })
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.session
    }

    /// False once the session has closed or been asked to stop
    pub fn is_alive(&self) -> bool {
        !self.session.is_done() && !self.session.is_stop_requested()
    }

    pub fn topics(&self) -> Vec<String> {
        lock(&self.routes).keys().cloned().collect()
    }

    /// Routes raw envelopes of `topic` to `on_message`, then sends the
    /// subscribe frame
    ///
    /// A topic can only be routed once per feed. If the frame cannot be sent
    /// the route is removed again.
    pub async fn subscribe<H, E>(&self, topic: &str, on_message: H, on_error: E) -> Result<()>
    where
        H: FnMut(String) + Send + 'static,
        E: FnMut(BingxError) + Send + 'static,
    {
        self.add_route(topic, Box::new(on_message), ErrorSink::new(on_error))?;
        self.send_subscribe(topic).await
    }

    /// Typed variant of [`subscribe`](Self::subscribe) for
    /// `{symbol}@{stream_kind}_{stream_param}`
    pub async fn subscribe_topic<T, F, E>(
        &self,
        symbol: &str,
        stream_kind: &str,
        stream_param: &str,
        on_event: F,
        on_error: E,
    ) -> Result<()>
    where
        T: DeserializeOwned + 'static,
        F: FnMut(T) + Send + 'static,
        E: FnMut(BingxError) + Send + 'static,
    {
        let topic = topic_key(symbol, stream_kind, stream_param);
        let errors = ErrorSink::new(on_error);
        let handler = topic_handler(topic.clone(), on_event, errors.clone());
        self.add_route(&topic, Box::new(handler), errors)?;
        self.send_subscribe(&topic).await
    }

    /// Aggregated candles for `symbol`, with their own aggregator
    pub async fn subscribe_klines<F, E>(
        &self,
        symbol: &str,
        interval: Interval,
        on_event: F,
        on_error: E,
    ) -> Result<()>
    where
        F: FnMut(WsKlineEvent) + Send + 'static,
        E: FnMut(BingxError) + Send + 'static,
    {
        let topic = kline_topic(symbol, interval);
        let errors = ErrorSink::new(on_error);
        let handler = kline_handler(symbol, interval, on_event, errors.clone());
        self.add_route(&topic, Box::new(handler), errors)?;
        self.send_subscribe(&topic).await
    }

    /// Drops the route for `topic` and tells the server
    pub async fn unsubscribe(&self, topic: &str) -> Result<()> {
        let removed = lock(&self.routes).remove(topic).is_some();
        if !removed {
            return Err(BingxError::InvalidRequest(format!("not subscribed to {}", topic)));
        }
        let frame = SubscriptionRequest::unsubscribe(topic).to_frame()?;
        self.session.send_text(&frame).await?;
        info!(topic = %topic, "Unsubscribed from shared feed");
        Ok(())
    }

    pub fn close(&self) {
        self.session.stop();
    }

    fn add_route(&self, topic: &str, on_message: Box<dyn FnMut(String) + Send>, errors: ErrorSink) -> Result<()> {
        if !self.is_alive() {
            return Err(BingxError::Transport("feed is closed".to_string()));
        }
        let mut routes = lock(&self.routes);
        if routes.contains_key(topic) {
            return Err(BingxError::InvalidRequest(format!("already subscribed to {}", topic)));
        }
        routes.insert(topic.to_string(), Route::new(on_message, errors));
        Ok(())
    }

    async fn send_subscribe(&self, topic: &str) -> Result<()> {
        let frame = SubscriptionRequest::subscribe(topic).to_frame()?;
        if let Err(e) = self.session.send_text(&frame).await {
            warn!(topic = %topic, error = %e, "Subscribe frame not sent");
            lock(&self.routes).remove(topic);
            return Err(e);
        }
        info!(topic = %topic, endpoint = %self.session.endpoint(), "Subscribed on shared feed");
        Ok(())
    }
}

/// At most one live [`SharedFeed`] per endpoint
#[derive(Default)]
pub struct StreamRegistry {
    feeds: tokio::sync::Mutex<HashMap<String, Arc<SharedFeed>>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live feed for `endpoint`, dialing a new one if there is
    /// none or the previous one has closed
    ///
    /// The registry lock is held across the dial, so concurrent first
    /// callers for an endpoint end up on the same connection.
    pub async fn get_or_create(&self, endpoint: &str) -> Result<Arc<SharedFeed>> {
        let mut feeds = self.feeds.lock().await;

        if let Some(feed) = feeds.get(endpoint) {
            if feed.is_alive() {
                return Ok(Arc::clone(feed));
            }
            debug!(endpoint = %redact_endpoint(endpoint), "Replacing closed feed");
            feeds.remove(endpoint);
        }

        let feed = Arc::new(SharedFeed::connect(endpoint).await?);
        feeds.insert(endpoint.to_string(), Arc::clone(&feed));
        Ok(feed)
    }

    /// Number of live feeds
    pub async fn len(&self) -> usize {
        self.feeds.lock().await.values().filter(|f| f.is_alive()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stops and forgets the feed for `endpoint`
    pub async fn close(&self, endpoint: &str) -> bool {
        match self.feeds.lock().await.remove(endpoint) {
            Some(feed) => {
                feed.close();
                true
            }
            None => false,
        }
    }

    pub async fn close_all(&self) {
        for (_, feed) in self.feeds.lock().await.drain() {
            feed.close();
        }
    }
}

/// Dropping the registry stops every feed it handed out, including those
/// callers still hold
impl Drop for StreamRegistry {
    fn drop(&mut self) {
        for (_, feed) in self.feeds.get_mut().drain() {
            feed.close();
        }
    }
}
