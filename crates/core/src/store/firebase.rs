use std::time::Duration;

use reqwest::{header::ACCEPT, Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    stream::{EventStreamParser, StreamPayload, StreamTree},
    Patch, RecordStore, Snapshot, SnapshotCallback, Subscription,
};
use crate::{
    error::{StoreError, WriteOp},
    models::{Collection, RecordId},
};

/// Record store backed by a hosted realtime database, spoken to over REST.
///
/// Each subscription runs a background task holding an event stream open
/// on the collection node. Subscribing therefore requires a Tokio runtime.
#[derive(Debug, Clone)]
pub struct FirebaseStore {
    client: Client,
    base: Url,
    query: Option<String>,
    reconnect_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

enum StreamEnd {
    /// The server closed the connection; reconnect.
    Closed,
    /// The server refused further updates; stop.
    Revoked(String),
}

impl FirebaseStore {
    /// Connect to the database rooted at `database_url`.
    pub fn new(database_url: &str, reconnect_delay: Duration) -> Result<Self, StoreError> {
        let invalid = |reason: String| StoreError::InvalidUrl {
            url: database_url.to_string(),
            reason,
        };
        let mut base = Url::parse(database_url).map_err(|err| invalid(err.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", base.scheme())));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let query = base.query().map(str::to_string);
        base.set_query(None);

        let client = Client::builder()
            .user_agent(concat!("gameshelf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| invalid(err.to_string()))?;

        Ok(Self {
            client,
            base,
            query,
            reconnect_delay,
        })
    }

    /// Root URL every collection path is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn collection_url(&self, collection: Collection) -> Result<Url, String> {
        self.resolve(&format!("{collection}.json"))
    }

    fn record_url(&self, collection: Collection, id: &RecordId) -> Result<Url, String> {
        self.resolve(&format!("{collection}/{id}.json"))
    }

    /// Join `path` onto the base, carrying over query parameters such as `ns`.
    fn resolve(&self, path: &str) -> Result<Url, String> {
        let mut url = self.base.join(path).map_err(|err| err.to_string())?;
        url.set_query(self.query.as_deref());
        Ok(url)
    }

    async fn send_write(
        &self,
        op: WriteOp,
        collection: Collection,
        request: RequestBuilder,
    ) -> Result<Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|err| StoreError::write(op, collection, err))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::write(
                op,
                collection,
                format!("{status}: {}", body.trim()),
            ));
        }
        Ok(response)
    }

    async fn run_stream(self, collection: Collection, mut on_snapshot: SnapshotCallback) {
        let mut version = 0u64;
        loop {
            match self.listen(collection, &mut version, &mut on_snapshot).await {
                Ok(StreamEnd::Closed) => debug!(%collection, "Realtime stream closed"),
                Ok(StreamEnd::Revoked(reason)) => {
                    warn!(%collection, %reason, "Realtime stream ended by server");
                    return;
                }
                Err(err) => warn!(%collection, %err, "Realtime stream failed"),
            }
            tokio::time::sleep(self.reconnect_delay).await;
            info!(%collection, "Reconnecting realtime stream");
        }
    }

    async fn listen(
        &self,
        collection: Collection,
        version: &mut u64,
        on_snapshot: &mut SnapshotCallback,
    ) -> Result<StreamEnd, StoreError> {
        let stream_err = |reason: String| StoreError::Stream { collection, reason };
        let url = self.collection_url(collection).map_err(stream_err)?;
        let mut response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|err| stream_err(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(stream_err(format!("server answered {status}")));
        }
        info!(%collection, "Realtime stream opened");

        let mut parser = EventStreamParser::default();
        let mut tree = StreamTree::default();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| stream_err(err.to_string()))?
        {
            for event in parser.feed(&chunk) {
                match event.name.as_str() {
                    "put" | "patch" => {
                        let payload: StreamPayload = match serde_json::from_str(&event.data) {
                            Ok(payload) => payload,
                            Err(err) => {
                                warn!(%collection, %err, "Ignoring undecodable stream event");
                                continue;
                            }
                        };
                        if event.name == "put" {
                            tree.put(&payload.path, payload.data);
                        } else {
                            tree.patch(&payload.path, payload.data);
                        }
                        *version += 1;
                        let snapshot = Snapshot::from_tree(collection, *version, tree.root());
                        debug!(%collection, version = *version, records = snapshot.len(), "Stream snapshot");
                        on_snapshot(snapshot);
                    }
                    "keep-alive" => {}
                    "cancel" | "auth_revoked" => return Ok(StreamEnd::Revoked(event.name.clone())),
                    other => debug!(%collection, event = other, "Ignoring stream event"),
                }
            }
        }
        Ok(StreamEnd::Closed)
    }
}

impl RecordStore for FirebaseStore {
    fn subscribe(&self, collection: Collection, on_snapshot: SnapshotCallback) -> Subscription {
        let task = tokio::spawn(self.clone().run_stream(collection, on_snapshot));
        debug!(%collection, "Subscribed to realtime stream");
        Subscription::new(move || {
            task.abort();
            debug!(%collection, "Realtime stream released");
        })
    }

    async fn create(&self, collection: Collection, payload: Value) -> Result<RecordId, StoreError> {
        let op = WriteOp::Create;
        let url = self
            .collection_url(collection)
            .map_err(|err| StoreError::write(op, collection, err))?;
        let response = self
            .send_write(op, collection, self.client.post(url).json(&payload))
            .await?;
        let pushed: PushResponse = response
            .json()
            .await
            .map_err(|err| StoreError::write(op, collection, err))?;
        let id = RecordId::new(pushed.name);
        info!(%collection, id = %id, "Created record");
        Ok(id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        patch: Patch,
    ) -> Result<(), StoreError> {
        let op = WriteOp::Update;
        let url = self
            .record_url(collection, id)
            .map_err(|err| StoreError::write(op, collection, err))?;
        self.send_write(op, collection, self.client.patch(url).json(&patch))
            .await?;
        info!(%collection, id = %id, "Updated record");
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<(), StoreError> {
        let op = WriteOp::Delete;
        let url = self
            .record_url(collection, id)
            .map_err(|err| StoreError::write(op, collection, err))?;
        self.send_write(op, collection, self.client.delete(url))
            .await?;
        info!(%collection, id = %id, "Deleted record");
        Ok(())
    }
}
