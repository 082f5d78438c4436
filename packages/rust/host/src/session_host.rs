//! A [`ContextHost`] backed by a session file.
//!
//! Contexts carrying a snapshot are ready immediately. Other `http(s)` and
//! `file` contexts are loaded in the background when they are first
//! activated, so a short settle interval after activation starts the load
//! without guaranteeing it finished. Running an agent against a context that
//! is still loading waits for the load; running it against a context that was
//! never activated fails.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::{Mutex, watch};
use tracing::{debug, instrument, warn};
use url::Url;

use tabharvest_extractor::ExtractionAgent;
use tabharvest_shared::{
    Context, ContextId, ExtractedIdentifier, FetchSection, HarvestError, PageContent, Result,
};

use crate::session::{SessionFile, load_session};
use crate::{Checkpoint, ContextHost};

/// Materialization state of one context's content realm.
#[derive(Debug, Clone)]
enum Content {
    /// Never activated and no snapshot.
    Unloaded,
    /// Load in flight; the receiver flips to `true` when it settles.
    Loading(watch::Receiver<bool>),
    Ready(String),
    /// Last load failed; the next activation retries.
    Failed(String),
}

#[derive(Debug)]
struct Slot {
    context: Context,
    content: Content,
}

/// Host over the contexts listed in a [`SessionFile`].
pub struct SessionHost {
    client: Client,
    slots: Arc<Mutex<Vec<Slot>>>,
}

impl SessionHost {
    /// Build a host from a parsed session.
    pub fn new(session: SessionFile, fetch: &FetchSection) -> Result<Self> {
        let client = Client::builder()
            .user_agent(fetch.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(fetch.timeout_secs))
            .build()
            .map_err(|e| HarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        let slots = session
            .contexts
            .into_iter()
            .enumerate()
            .map(|(i, entry)| Slot {
                context: Context {
                    id: ContextId(entry.id.unwrap_or(i as u64 + 1)),
                    address: entry.address,
                    active: entry.active,
                },
                content: match entry.html {
                    Some(html) => Content::Ready(html),
                    None => Content::Unloaded,
                },
            })
            .collect();

        Ok(Self {
            client,
            slots: Arc::new(Mutex::new(slots)),
        })
    }

    /// Load a session file from disk and build a host over it.
    pub fn open(path: &Path, fetch: &FetchSection) -> Result<Self> {
        Self::new(load_session(path)?, fetch)
    }

    /// Return the address and markup of `id`, waiting for an in-flight load.
    async fn content_of(&self, id: ContextId) -> Result<(String, String)> {
        loop {
            let mut pending = {
                let slots = self.slots.lock().await;
                let slot = slots
                    .iter()
                    .find(|s| s.context.id == id)
                    .ok_or(HarvestError::UnknownContext(id))?;

                if !slot.context.is_scriptable() {
                    return Err(HarvestError::NotScriptable {
                        id,
                        address: slot.context.address.clone(),
                    });
                }

                match &slot.content {
                    Content::Ready(html) => {
                        return Ok((slot.context.address.clone(), html.clone()));
                    }
                    Content::Failed(reason) => return Err(HarvestError::Network(reason.clone())),
                    Content::Unloaded => return Err(HarvestError::NotMaterialized(id)),
                    Content::Loading(rx) => rx.clone(),
                }
            };

            if pending.wait_for(|settled| *settled).await.is_err() {
                return Err(HarvestError::NotMaterialized(id));
            }
        }
    }
}

#[async_trait]
impl ContextHost for SessionHost {
    async fn list_contexts(&self) -> Result<Vec<Context>> {
        let slots = self.slots.lock().await;
        Ok(slots.iter().map(|s| s.context.clone()).collect())
    }

    #[instrument(skip_all, fields(context = %id))]
    async fn activate(&self, id: ContextId) -> Result<()> {
        let mut slots = self.slots.lock().await;
        let idx = slots
            .iter()
            .position(|s| s.context.id == id)
            .ok_or(HarvestError::UnknownContext(id))?;

        for slot in slots.iter_mut() {
            slot.context.active = slot.context.id == id;
        }

        let slot = &mut slots[idx];
        let needs_load = matches!(slot.content, Content::Unloaded | Content::Failed(_));
        if needs_load && slot.context.is_scriptable() {
            let (tx, rx) = watch::channel(false);
            slot.content = Content::Loading(rx);

            let address = slot.context.address.clone();
            let client = self.client.clone();
            let shared = Arc::clone(&self.slots);

            tokio::spawn(async move {
                let outcome = materialize(&client, &address).await;
                {
                    let mut slots = shared.lock().await;
                    if let Some(slot) = slots.iter_mut().find(|s| s.context.id == id) {
                        slot.content = match outcome {
                            Ok(html) => {
                                debug!(context = %id, %address, bytes = html.len(), "materialized");
                                Content::Ready(html)
                            }
                            Err(e) => {
                                warn!(context = %id, %address, error = %e, "materialization failed");
                                Content::Failed(e.to_string())
                            }
                        };
                    }
                }
                let _ = tx.send(true);
            });
        }

        debug!("activated");
        Ok(())
    }

    async fn execute(
        &self,
        id: ContextId,
        agent: Arc<dyn ExtractionAgent>,
    ) -> Result<Vec<ExtractedIdentifier>> {
        let (address, html) = self.content_of(id).await?;
        let page = PageContent { address, html };

        // Parsing is CPU-bound; keep it off the cooperative workers.
        tokio::task::spawn_blocking(move || agent.extract(&page))
            .await
            .map_err(|e| HarvestError::Task(format!("context {id}: {e}")))
    }

    async fn inject_checkpoint(
        &self,
        id: ContextId,
        checkpoint: Arc<dyn Checkpoint>,
    ) -> Result<()> {
        let context = {
            let slots = self.slots.lock().await;
            let slot = slots
                .iter()
                .find(|s| s.context.id == id)
                .ok_or(HarvestError::UnknownContext(id))?;
            slot.context.clone()
        };

        if !context.is_scriptable() {
            return Err(HarvestError::NotScriptable {
                id,
                address: context.address,
            });
        }

        tokio::spawn(async move { checkpoint.run(context).await });
        Ok(())
    }
}

/// Load the markup behind `address`.
async fn materialize(client: &Client, address: &str) -> Result<String> {
    let url = Url::parse(address).map_err(|e| HarvestError::host(format!("{address}: {e}")))?;

    match url.scheme() {
        "http" | "https" => {
            let response = client
                .get(url.as_str())
                .send()
                .await
                .map_err(|e| HarvestError::Network(format!("{url}: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                return Err(HarvestError::Network(format!("{url}: HTTP {status}")));
            }

            response
                .text()
                .await
                .map_err(|e| HarvestError::Network(format!("{url}: body read failed: {e}")))
        }
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|()| HarvestError::host(format!("{url}: not a local path")))?;
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| HarvestError::io(path, e))
        }
        other => Err(HarvestError::host(format!(
            "{url}: cannot materialize '{other}' contexts"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionContext;
    use tabharvest_extractor::MagnetAgent;

    fn entry(address: &str, html: Option<&str>) -> SessionContext {
        SessionContext {
            address: address.into(),
            html: html.map(String::from),
            ..Default::default()
        }
    }

    fn host(entries: Vec<SessionContext>) -> SessionHost {
        SessionHost::new(SessionFile { contexts: entries }, &FetchSection::default()).unwrap()
    }

    fn magnet(c: char) -> String {
        format!("magnet:?xt=urn:btih:{}", c.to_string().repeat(40))
    }

    fn agent() -> Arc<dyn ExtractionAgent> {
        Arc::new(MagnetAgent)
    }

    #[tokio::test]
    async fn snapshot_context_is_ready_without_activation() {
        let html = format!("<html><body><p>{}</p></body></html>", magnet('a'));
        let host = host(vec![entry("http://x.example", Some(&html))]);

        let found = host.execute(ContextId(1), agent()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].as_str(), magnet('a'));
    }

    #[tokio::test]
    async fn remote_context_needs_activation() {
        let server = wiremock::MockServer::start().await;
        let body = format!(r#"<html><body><a href="{}">get</a></body></html>"#, magnet('b'));

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/list"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let host = host(vec![entry(&format!("{}/list", server.uri()), None)]);

        let err = host.execute(ContextId(1), agent()).await.unwrap_err();
        assert!(matches!(err, HarvestError::NotMaterialized(ContextId(1))));

        host.activate(ContextId(1)).await.unwrap();
        let found = host.execute(ContextId(1), agent()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].as_str(), magnet('b'));
    }

    #[tokio::test]
    async fn failed_load_reports_network_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::path("/gone"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let host = host(vec![entry(&format!("{}/gone", server.uri()), None)]);
        host.activate(ContextId(1)).await.unwrap();

        let err = host.execute(ContextId(1), agent()).await.unwrap_err();
        assert!(matches!(err, HarvestError::Network(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn local_file_context_loads_on_activation() {
        let dir = std::env::temp_dir().join(format!("th-host-file-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("saved list.html");
        std::fs::write(
            &path,
            format!(r#"<html><body><a href="{}">get</a></body></html>"#, magnet('d')),
        )
        .unwrap();
        let address = Url::from_file_path(&path).unwrap().to_string();
        let missing = Url::from_file_path(dir.join("gone.html")).unwrap().to_string();

        let host = host(vec![entry(&address, None), entry(&missing, None)]);

        let err = host.execute(ContextId(1), agent()).await.unwrap_err();
        assert!(matches!(err, HarvestError::NotMaterialized(ContextId(1))));

        host.activate(ContextId(1)).await.unwrap();
        let found = host.execute(ContextId(1), agent()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].as_str(), magnet('d'));

        host.activate(ContextId(2)).await.unwrap();
        let err = host.execute(ContextId(2), agent()).await.unwrap_err();
        assert!(err.to_string().contains("gone.html"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn system_context_is_not_scriptable() {
        let host = host(vec![entry("chrome://settings", Some("<p></p>"))]);

        host.activate(ContextId(1)).await.unwrap();
        let err = host.execute(ContextId(1), agent()).await.unwrap_err();
        assert!(matches!(err, HarvestError::NotScriptable { .. }));
    }

    #[tokio::test]
    async fn activation_is_exclusive() {
        let mut first = entry("http://a.example", Some(""));
        first.active = true;
        let host = host(vec![first, entry("http://b.example", Some(""))]);

        host.activate(ContextId(2)).await.unwrap();
        let contexts = host.list_contexts().await.unwrap();
        assert!(!contexts[0].active);
        assert!(contexts[1].active);

        let err = host.activate(ContextId(42)).await.unwrap_err();
        assert!(matches!(err, HarvestError::UnknownContext(ContextId(42))));
    }

    struct Recorder(Mutex<Option<tokio::sync::oneshot::Sender<Context>>>);

    #[async_trait]
    impl Checkpoint for Recorder {
        async fn run(&self, context: Context) {
            if let Some(tx) = self.0.lock().await.take() {
                let _ = tx.send(context);
            }
        }
    }

    #[tokio::test]
    async fn checkpoint_runs_in_target_context() {
        let host = host(vec![
            entry("chrome://newtab", None),
            entry("http://a.example", Some("")),
        ]);
        let (tx, rx) = tokio::sync::oneshot::channel();
        let recorder = Arc::new(Recorder(Mutex::new(Some(tx))));

        let err = host
            .inject_checkpoint(ContextId(1), recorder.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::NotScriptable { .. }));

        host.inject_checkpoint(ContextId(2), recorder).await.unwrap();
        let context = rx.await.unwrap();
        assert_eq!(context.address, "http://a.example");
    }
}
