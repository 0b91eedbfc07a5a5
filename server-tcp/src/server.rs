use crate::protocol::{Request, Response, codec};
use dogpile::ports::KvStore;
use futures::{SinkExt, StreamExt};
use shared::Error;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

/// Accept connections forever, serving each on its own task
pub async fn run(listener: TcpListener, store: Arc<dyn KvStore>) -> std::io::Result<()> {
    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                info!("Connection {addr} successful.");
                let store = store.clone();

                tokio::spawn(async move {
                    if let Err(err) = process_connection(socket, store).await {
                        warn!("Connection {addr} error: {err:?}");
                    }
                });
            }
            Err(e) => {
                error!("TCP accept error: {}", e);
            }
        }
    }
}

pub async fn process_connection(
    socket: TcpStream,
    store: Arc<dyn KvStore>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    socket.set_nodelay(true).ok();

    let mut framed = Framed::new(socket, codec());

    while let Some(frame_result) = framed.next().await {
        let frame = frame_result?;

        let response = match Request::decode(frame.freeze()) {
            Ok(request) => {
                debug!("Received request: {:?}", request);
                handle_request(store.as_ref(), request).await
            }
            Err(e) => {
                error!("Failed to decode request: {}", e);
                Response::Error { msg: e }
            }
        };

        framed.send(response.encode()).await?;
    }

    Ok(())
}

/// Execute one request against the store
pub async fn handle_request(store: &dyn KvStore, request: Request) -> Response {
    let outcome = match request {
        Request::Ping => Ok(Response::Pong),

        Request::Get { namespace, key } => store.get(&namespace, &key).await.map(|value| match value {
            Some(value) => Response::Value { value },
            None => Response::NotFound,
        }),

        Request::Set { namespace, key, ttl, value } => match String::from_utf8(value.to_vec()) {
            Ok(value) => store.set(&namespace, &key, value, ttl).await.map(|_| Response::Ok),
            Err(e) => Err(Error::InvalidPayloadType(format!(
                "value for '{}/{}' is not UTF-8: {}",
                namespace, key, e
            ))),
        },

        Request::Contains { namespace, key } => store
            .contains(&namespace, &key)
            .await
            .map(|value| Response::Bool { value }),

        Request::Remove { namespace, key } => store.remove(&namespace, &key).await.map(|_| Response::Ok),
    };

    outcome.unwrap_or_else(|e| {
        warn!("Request failed: {}", e);
        Response::Error { msg: e.to_string() }
    })
}
