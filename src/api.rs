use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::models::Dimension;

pub type Query = Vec<(String, String)>;

/// Backend resources consumed by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Kpis,
    Trend,
    Waterfall,
    Summary(Dimension),
    NpsByRisk,
    Renewal,
    Queue,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Kpis => "/kpis",
            Endpoint::Trend => "/trend",
            Endpoint::Waterfall => "/waterfall",
            Endpoint::Summary(_) => "/summary",
            Endpoint::NpsByRisk => "/nps_risco",
            Endpoint::Renewal => "/renovacao",
            Endpoint::Queue => "/queue",
        }
    }

    pub fn base_query(self) -> Query {
        match self {
            Endpoint::Summary(dim) => vec![("dim".to_string(), dim.query_value().to_string())],
            _ => Vec::new(),
        }
    }
}

/// GETs a JSON document. Implementations map any non-2xx status, transport
/// problem or undecodable body to a [`FetchError`].
pub trait Transport {
    fn get_json(
        &self,
        endpoint: Endpoint,
        query: &[(String, String)],
    ) -> impl Future<Output = Result<Value, FetchError>> + Send;
}

#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    root: String,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(Duration::from_secs(5)))
            .build()?;
        Ok(Self {
            http,
            root: config.root.clone(),
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }
}

impl Transport for HttpTransport {
    #[instrument(skip(self, query), fields(path = endpoint.path()))]
    async fn get_json(
        &self,
        endpoint: Endpoint,
        query: &[(String, String)],
    ) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.root, endpoint.path());
        let mut params = endpoint.base_query();
        params.extend_from_slice(query);

        let response = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| match transport_error(&url, e) {
                FetchError::Transport { url, reason } => FetchError::Malformed { url, reason },
                other => other,
            })?;
        debug!(%status, "fetched");
        Ok(body)
    }
}

fn transport_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
pub mod fake {
    //! Scripted in-memory backend for tests.

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use serde_json::{json, Value};

    use super::{Endpoint, Transport};
    use crate::error::FetchError;

    type QueueFn = dyn Fn(usize, usize) -> Result<Value, FetchError> + Send + Sync;

    #[derive(Clone, Default)]
    pub struct ScriptedTransport {
        routes: Arc<HashMap<String, Result<Value, FetchError>>>,
        queue: Option<Arc<QueueFn>>,
        pub calls: Arc<Mutex<Vec<(String, Vec<(String, String)>)>>>,
    }

    pub fn route_key(endpoint: Endpoint) -> String {
        match endpoint {
            Endpoint::Summary(dim) => format!("/summary?dim={}", dim.query_value()),
            other => other.path().to_string(),
        }
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, endpoint: Endpoint, result: Result<Value, FetchError>) -> Self {
            Arc::make_mut(&mut self.routes).insert(route_key(endpoint), result);
            self
        }

        pub fn with_queue(
            mut self,
            f: impl Fn(usize, usize) -> Result<Value, FetchError> + Send + Sync + 'static,
        ) -> Self {
            self.queue = Some(Arc::new(f));
            self
        }

        /// Every static endpoint answers with one plausible row.
        pub fn healthy() -> Self {
            Self::new()
                .with(Endpoint::Kpis, Ok(json!({"churn_logos_pct": 3.2, "nrr_pct": 104.0})))
                .with(
                    Endpoint::Trend,
                    Ok(json!([{"mes": "2025-01-01", "churnRate": 3.1, "revChurn": 1200, "grr": 92, "nrr": 103}])),
                )
                .with(
                    Endpoint::Waterfall,
                    Ok(json!([{"etapa": "Início", "valor": 1000}, {"etapa": "Churn", "valor": -150}])),
                )
                .with(
                    Endpoint::Summary(crate::models::Dimension::Segment),
                    Ok(json!([{"cat": "Varejo", "baixo": 5, "medio": 3, "alto": 2}])),
                )
                .with(
                    Endpoint::Summary(crate::models::Dimension::Region),
                    Ok(json!([{"cat": "SP", "baixo": 1, "medio": 1, "alto": 1}])),
                )
                .with(
                    Endpoint::Summary(crate::models::Dimension::RevenueBand),
                    Ok(json!([{"cat": "Faixa 07", "baixo": 0, "medio": 0, "alto": 0}])),
                )
                .with(Endpoint::NpsByRisk, Ok(json!([{"risco": "Alto", "nps": -12}])))
                .with(
                    Endpoint::Renewal,
                    Ok(json!([{"janela": "0–30", "mrr": 5400, "clientes": 4}])),
                )
        }

        pub fn call_count(&self, endpoint: Endpoint) -> usize {
            let key = endpoint.path();
            self.calls
                .lock()
                .map(|calls| calls.iter().filter(|(path, _)| path == key).count())
                .unwrap_or(0)
        }
    }

    fn param(query: &[(String, String)], key: &str) -> Option<usize> {
        query
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.parse().ok())
    }

    impl Transport for ScriptedTransport {
        async fn get_json(
            &self,
            endpoint: Endpoint,
            query: &[(String, String)],
        ) -> Result<Value, FetchError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((endpoint.path().to_string(), query.to_vec()));
            }
            if endpoint == Endpoint::Queue {
                if let Some(queue) = &self.queue {
                    let offset = param(query, "offset").unwrap_or(0);
                    let limit = param(query, "limit").unwrap_or(50);
                    return queue(offset, limit);
                }
            }
            self.routes
                .get(&route_key(endpoint))
                .cloned()
                .unwrap_or_else(|| {
                    Err(FetchError::Status {
                        url: route_key(endpoint),
                        status: 404,
                    })
                })
        }
    }

    /// Queue backend holding `total` synthetic customers.
    pub fn queue_of(total: usize) -> impl Fn(usize, usize) -> Result<Value, FetchError> {
        move |offset, limit| {
            let end = (offset + limit).min(total);
            let items: Vec<Value> = (offset.min(end)..end)
                .map(|i| {
                    json!({
                        "id": format!("C-{i}"),
                        "cliente": format!("Cliente {i}"),
                        "mrr": 100 + i,
                        "risco": (i * 7) % 100,
                        "renovacao": i % 90,
                        "uf": "SP",
                    })
                })
                .collect();
            Ok(json!({"items": items, "total": total}))
        }
    }
}
