//! Composition root for a live-data client.
//!
//! [`LiveClient`] turns an [`AppConfig`] into the shared pieces every view
//! needs: the session, the notification bus, the reqwest transport behind a
//! request queue, and the REST data API. Providers, live containers and the
//! notification proxy built through it pick up their timings from config.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::adapters::{
    BroadcastNotificationBus, InMemorySession, ReqwestTransport, ReqwestTransportConfig,
    TungsteniteConnector, WebSocketProxy, WebSocketProxyConfig, WebSocketProxyHandle,
};
use crate::application::crud::RestDataApi;
use crate::application::{
    ConnectionNotifier, DataProvider, DataProviderConfig, LiveConfig, LiveQuery, LiveResources,
    RequestFactory, RequestQueue, ResourceSpec, ResponseHandler,
};
use crate::config::AppConfig;
use crate::domain::changes::ListenTo;
use crate::domain::collection::Entity;
use crate::domain::foundation::ResourceName;
use crate::domain::query::QueryDescriptor;
use crate::ports::{DataApi, HttpTransport, NetworkError};

pub struct LiveClient {
    session: Arc<InMemorySession>,
    bus: Arc<BroadcastNotificationBus>,
    queue: RequestQueue,
    api: Arc<dyn DataApi>,
    providers: DataProviderConfig,
    containers: LiveConfig,
    proxy: WebSocketProxyConfig,
}

impl LiveClient {
    /// Wires a client against the configured server over HTTP.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError::Connection` if the HTTP client cannot be built.
    pub fn new(config: &AppConfig) -> Result<Self, NetworkError> {
        let session = Arc::new(match config.auth.session() {
            Some(session) => InMemorySession::with_session(session),
            None => InMemorySession::new(),
        });
        let transport = ReqwestTransport::new(
            ReqwestTransportConfig::from(&config.server),
            session.clone(),
        )?;
        Ok(Self::with_transport(config, session, Arc::new(transport)))
    }

    /// Wires a client over any transport.
    pub fn with_transport(
        config: &AppConfig,
        session: Arc<InMemorySession>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            session,
            bus: Arc::new(BroadcastNotificationBus::new(config.websocket.bus_capacity)),
            queue: RequestQueue::new(Arc::clone(&transport), config.queue.concurrency),
            api: Arc::new(RestDataApi::new(transport)),
            providers: config.live.data_provider(),
            containers: config.live.containers(),
            proxy: WebSocketProxyConfig::from_config(&config.server, &config.websocket),
        }
    }

    pub fn session(&self) -> &Arc<InMemorySession> {
        &self.session
    }

    pub fn bus(&self) -> &Arc<BroadcastNotificationBus> {
        &self.bus
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn api(&self) -> Arc<dyn DataApi> {
        Arc::clone(&self.api)
    }

    /// Starts a provider on the shared queue with the configured debounce.
    pub fn data_provider(
        &self,
        request_factory: RequestFactory,
        response_handler: ResponseHandler,
        listen_to: ListenTo,
    ) -> DataProvider {
        DataProvider::start(
            self.queue.clone(),
            self.bus.as_ref(),
            request_factory,
            response_handler,
            listen_to,
            self.providers.clone(),
        )
    }

    /// Starts a live query with the configured throttle.
    pub fn live_query<T>(&self, resource: ResourceName, query: QueryDescriptor) -> LiveQuery<T>
    where
        T: Entity + DeserializeOwned,
    {
        LiveQuery::with_config(self.api(), self.bus.as_ref(), resource, query, self.containers.clone())
    }

    /// Starts a set of live resources with the configured throttle.
    pub fn live_resources(&self, specs: Vec<ResourceSpec>) -> LiveResources {
        LiveResources::with_config(self.api(), self.bus.as_ref(), specs, self.containers.clone())
    }

    pub fn connection_notifier(&self) -> ConnectionNotifier {
        ConnectionNotifier::start(self.bus.as_ref(), self.session.clone())
    }

    /// Connects to the notification server and keeps reconnecting until
    /// the handle shuts down.
    pub fn spawn_proxy(&self) -> WebSocketProxyHandle {
        WebSocketProxy::new(
            Arc::new(TungsteniteConnector::new()),
            self.session.clone(),
            self.bus.clone(),
            self.proxy.clone(),
        )
        .spawn()
    }

    pub fn proxy_config(&self) -> &WebSocketProxyConfig {
        &self.proxy
    }
}
