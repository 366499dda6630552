use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use data_encoding::BASE64URL;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use url::Url;

use super::{CloudError, CloudResult};

pub const DEFAULT_DOMAIN: &str = "oraclecloud.com";
pub const TOKEN_REQUEST_PATH: &str = "cluster_request";

const REQUIRED_SIGNED_HEADERS: [&str; 2] = ["date", "authorization"];
const OPTIONAL_SIGNED_HEADERS: [&str; 2] = ["opc-obo-token", "x-cross-tenancy-request"];

/// Signs HTTP requests with the credentials the manager was configured with.
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait RequestSigner: Send + Sync {
    /// returns the headers that have to accompany the request for the signature to verify
    fn sign(&self, method: &str, url: &Url) -> CloudResult<BTreeMap<String, String>>;
}

/// Issues bearer tokens accepted by the API server of a managed cluster.
#[cfg_attr(any(test, feature = "mock"), automock)]
#[async_trait]
pub trait TokenClient: Send + Sync {
    async fn generate_token(&self, cluster_id: &str) -> CloudResult<String>;
}

/// Token client producing pre-authenticated token requests.
///
/// The token is the base64url encoded, signed URL of the cluster's token endpoint, with the
/// signature headers moved into the query string. The API server replays that request to
/// authenticate the caller, no token RPC is involved.
pub struct SignedUrlTokenClient {
    endpoint: Url,
    signer: Arc<dyn RequestSigner>,
}

impl SignedUrlTokenClient {
    pub fn new(region: &str, signer: Arc<dyn RequestSigner>) -> CloudResult<Self> {
        Self::with_domain(region, DEFAULT_DOMAIN, signer)
    }

    pub fn with_domain(
        region: &str,
        domain: &str,
        signer: Arc<dyn RequestSigner>,
    ) -> CloudResult<Self> {
        let endpoint = Url::parse(&format!("https://containerengine.{region}.oci.{domain}/"))
            .map_err(|e| CloudError::Signing(format!("invalid token endpoint: {e}")))?;

        Ok(Self { endpoint, signer })
    }

    fn token_request_url(&self, cluster_id: &str) -> CloudResult<Url> {
        self.endpoint
            .join(&format!("{TOKEN_REQUEST_PATH}/{cluster_id}"))
            .map_err(|e| CloudError::Signing(format!("invalid cluster id '{cluster_id}': {e}")))
    }
}

#[async_trait]
impl TokenClient for SignedUrlTokenClient {
    async fn generate_token(&self, cluster_id: &str) -> CloudResult<String> {
        let mut url = self.token_request_url(cluster_id)?;
        let headers = self.signer.sign("GET", &url)?;

        {
            let mut query = url.query_pairs_mut();
            for name in REQUIRED_SIGNED_HEADERS {
                let value = find_header(&headers, name).ok_or_else(|| {
                    CloudError::Signing(format!("signer didn't produce the '{name}' header"))
                })?;
                query.append_pair(name, value);
            }

            for name in OPTIONAL_SIGNED_HEADERS {
                if let Some(value) = find_header(&headers, name) {
                    query.append_pair(name, value);
                }
            }
        }

        Ok(BASE64URL.encode(url.as_str().as_bytes()))
    }
}

fn find_header<'a>(headers: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
