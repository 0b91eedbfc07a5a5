use crate::protocol::{Request, Response, codec};
use async_trait::async_trait;
use bytes::Bytes;
use dogpile::ports::KvStore;
use futures::{SinkExt, StreamExt};
use shared::{Error, Result, TtlSecs};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// [`KvStore`] backed by a remote `server-tcp` instance.
///
/// Lets coordinators in separate processes share one store. Requests are
/// serialised over a single connection.
pub struct RemoteKvStore {
    framed: Mutex<Framed<TcpStream, LengthDelimitedCodec>>,
}

impl RemoteKvStore {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::Storage(format!("Failed to connect: {}", e)))?;
        stream.set_nodelay(true).ok();

        Ok(Self {
            framed: Mutex::new(Framed::new(stream, codec())),
        })
    }

    pub async fn ping(&self) -> Result<()> {
        match self.call(Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected("PING", other)),
        }
    }

    async fn call(&self, request: Request) -> Result<Response> {
        // Held across the round trip so responses cannot interleave
        let mut framed = self.framed.lock().await;

        framed
            .send(request.encode())
            .await
            .map_err(|e| Error::Storage(format!("Failed to send request: {}", e)))?;

        let frame = framed
            .next()
            .await
            .ok_or_else(|| Error::Storage("Connection closed by server".to_string()))?
            .map_err(|e| Error::Storage(format!("Failed to read response: {}", e)))?;

        match Response::decode(frame.freeze()).map_err(Error::Protocol)? {
            Response::Error { msg } => Err(Error::Storage(msg)),
            response => Ok(response),
        }
    }
}

fn unexpected(cmd: &str, response: Response) -> Error {
    Error::Protocol(format!("Unexpected response to {}: {:?}", cmd, response))
}

#[async_trait]
impl KvStore for RemoteKvStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let request = Request::Get {
            namespace: namespace.to_string(),
            key: key.to_string(),
        };
        match self.call(request).await? {
            Response::Value { value } => Ok(Some(value)),
            Response::NotFound => Ok(None),
            other => Err(unexpected("GET", other)),
        }
    }

    async fn set(&self, namespace: &str, key: &str, value: String, ttl: TtlSecs) -> Result<()> {
        let request = Request::Set {
            namespace: namespace.to_string(),
            key: key.to_string(),
            ttl,
            value: Bytes::from(value),
        };
        match self.call(request).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected("SET", other)),
        }
    }

    async fn contains(&self, namespace: &str, key: &str) -> Result<bool> {
        let request = Request::Contains {
            namespace: namespace.to_string(),
            key: key.to_string(),
        };
        match self.call(request).await? {
            Response::Bool { value } => Ok(value),
            other => Err(unexpected("CONTAINS", other)),
        }
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        let request = Request::Remove {
            namespace: namespace.to_string(),
            key: key.to_string(),
        };
        match self.call(request).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected("REMOVE", other)),
        }
    }
}

impl std::fmt::Debug for RemoteKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let peer = self
            .framed
            .try_lock()
            .ok()
            .and_then(|framed| framed.get_ref().peer_addr().ok());
        f.debug_struct("RemoteKvStore").field("peer", &peer).finish()
    }
}
