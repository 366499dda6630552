//! Regional cache of cloud service clients.
//!
//! Clusters can live in different regions, every region gets its own set of clients that is
//! built once and shared by all reconcilers.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use capoci_core::cloud::{
    compute::{ComputeClient, ComputeManagementClient},
    container_engine::ContainerEngineClient,
    identity::IdentityClient,
    load_balancer::LoadBalancerClient,
    network::VirtualNetworkClient,
    token::TokenClient,
};
use log::info;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error("Region can't be empty!")]
    EmptyRegion,
    #[error("Couldn't create clients for region '{}'! Reason: {}", .region, .reason)]
    Build { region: String, reason: String },
}

/// clients of every cloud service a reconciler may talk to, all bound to one region
#[derive(Clone)]
pub struct ClientBundle {
    pub network: Arc<dyn VirtualNetworkClient>,
    pub load_balancer: Arc<dyn LoadBalancerClient>,
    pub identity: Arc<dyn IdentityClient>,
    pub compute: Arc<dyn ComputeClient>,
    pub compute_management: Arc<dyn ComputeManagementClient>,
    pub container_engine: Arc<dyn ContainerEngineClient>,
    pub token: Arc<dyn TokenClient>,
}

/// Creates the clients of a region, usually backed by an SDK configuration provider.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn build(&self, region: &str) -> Result<ClientBundle, ClientError>;
}

pub struct ClientProvider {
    factory: Arc<dyn ClientFactory>,
    clients: RwLock<HashMap<String, ClientBundle>>,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ClientProvider {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            clients: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the clients of `region`, building them on the first request.
    ///
    /// Concurrent first requests for the same region share a single build. A failed build
    /// isn't cached, the next request tries again.
    pub async fn get_or_build_client(&self, region: &str) -> Result<ClientBundle, ClientError> {
        if region.is_empty() {
            return Err(ClientError::EmptyRegion);
        }

        {
            let read_guard = self.clients.read().await;

            if let Some(bundle) = read_guard.get(region) {
                return Ok(bundle.clone());
            }
        }

        let region_lock = self
            .in_flight
            .lock()
            .await
            .entry(region.to_owned())
            .or_default()
            .clone();
        let _build_guard = region_lock.lock().await;

        {
            let read_guard = self.clients.read().await;

            if let Some(bundle) = read_guard.get(region) {
                return Ok(bundle.clone());
            }
        }

        info!("Creating cloud clients for '{region}' region...");
        let bundle = self.factory.build(region).await?;

        self.clients
            .write()
            .await
            .insert(region.to_owned(), bundle.clone());

        Ok(bundle)
    }

    pub async fn is_cached(&self, region: &str) -> bool {
        self.clients.read().await.contains_key(region)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use capoci_core::cloud::{
        compute::{MockComputeClient, MockComputeManagementClient},
        container_engine::MockContainerEngineClient,
        identity::MockIdentityClient,
        load_balancer::MockLoadBalancerClient,
        network::MockVirtualNetworkClient,
        token::MockTokenClient,
    };

    use super::*;

    /// bundle of mocks without expectations, tests replace the clients they exercise
    pub(crate) fn empty_bundle() -> ClientBundle {
        ClientBundle {
            network: Arc::new(MockVirtualNetworkClient::new()),
            load_balancer: Arc::new(MockLoadBalancerClient::new()),
            identity: Arc::new(MockIdentityClient::new()),
            compute: Arc::new(MockComputeClient::new()),
            compute_management: Arc::new(MockComputeManagementClient::new()),
            container_engine: Arc::new(MockContainerEngineClient::new()),
            token: Arc::new(MockTokenClient::new()),
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        builds: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ClientFactory for CountingFactory {
        async fn build(&self, region: &str) -> Result<ClientBundle, ClientError> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;

            if self.fail {
                return Err(ClientError::Build {
                    region: region.to_owned(),
                    reason: "no credentials".to_owned(),
                });
            }

            Ok(empty_bundle())
        }
    }

    #[tokio::test]
    async fn empty_region_is_rejected_without_touching_the_cache() {
        let factory = Arc::new(CountingFactory::default());
        let provider = ClientProvider::new(factory.clone());

        let result = provider.get_or_build_client("").await;

        assert!(matches!(result, Err(ClientError::EmptyRegion)));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 0);
        assert!(!provider.is_cached("").await);
    }

    #[tokio::test]
    async fn concurrent_requests_share_a_single_build() {
        let factory = Arc::new(CountingFactory::default());
        let provider = ClientProvider::new(factory.clone());

        let (first, second, third) = tokio::join!(
            provider.get_or_build_client("us-phoenix-1"),
            provider.get_or_build_client("us-phoenix-1"),
            provider.get_or_build_client("us-phoenix-1"),
        );

        assert!(first.is_ok() && second.is_ok() && third.is_ok());
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);

        provider.get_or_build_client("us-ashburn-1").await.unwrap();
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_build_is_retried() {
        let factory = Arc::new(CountingFactory {
            fail: true,
            ..Default::default()
        });
        let provider = ClientProvider::new(factory.clone());

        assert!(provider.get_or_build_client("us-phoenix-1").await.is_err());
        assert!(provider.get_or_build_client("us-phoenix-1").await.is_err());

        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
        assert!(!provider.is_cached("us-phoenix-1").await);
    }
}
