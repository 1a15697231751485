use std::io::BufWriter;
use std::io::Write;
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;

use log::{debug, error};
use serde_json::Deserializer;

use crate::common::{PoolStats, Request, Response};
use crate::router::{Message, Router};
use crate::thread_pool::ThreadPool;
use crate::Result;

type StatsFn = Arc<dyn Fn() -> PoolStats + Send + Sync>;

/// A TCP front end that feeds published messages into a thread pool.
///
/// Generic over the thread pool `P`. Each connection gets its own thread,
/// so connected clients never occupy pool workers. Only published messages
/// become jobs on the pool.
pub struct JobServer<P: ThreadPool> {
    router: Arc<Router>,
    pool: Arc<P>,
    stats: Option<StatsFn>,
}

impl<P: ThreadPool + Send + Sync + 'static> JobServer<P> {
    /// Creates a `JobServer` with a given router and thread pool.
    pub fn new(router: Router, pool: Arc<P>) -> Self {
        Self {
            router: Arc::new(router),
            pool,
            stats: None,
        }
    }

    /// Answers `Stats` requests with snapshots taken by `stats`.
    pub fn with_stats<F>(mut self, stats: F) -> Self
    where
        F: Fn() -> PoolStats + Send + Sync + 'static,
    {
        self.stats = Some(Arc::new(stats));
        self
    }

    /// Runs the server, listening for connections on the given address.
    pub fn run(&self, addr: impl ToSocketAddrs) -> Result<()> {
        self.serve(TcpListener::bind(addr)?)
    }

    /// Serves connections from an already bound listener.
    pub fn serve(&self, listener: TcpListener) -> Result<()> {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let router = self.router.clone();
                    let pool = self.pool.clone();
                    let stats = self.stats.clone();
                    let spawned = thread::Builder::new()
                        .name("jobpool-conn".to_owned())
                        .spawn(move || {
                            if let Err(e) =
                                handle_connection(&router, pool.as_ref(), stats, stream)
                            {
                                error!("Error handling connection: {}", e);
                            }
                        });
                    if let Err(e) = spawned {
                        error!("Failed to spawn connection thread: {}", e);
                    }
                }
                Err(e) => error!("Connection failed: {}", e),
            }
        }

        Ok(())
    }
}

/// Handles a single client connection.
fn handle_connection<P: ThreadPool>(
    router: &Router,
    pool: &P,
    stats: Option<StatsFn>,
    stream: TcpStream,
) -> Result<()> {
    let peer_addr = stream.peer_addr()?;
    debug!("Accepted connection from {}", peer_addr);

    let reader = &stream;
    let mut writer = BufWriter::new(&stream);
    let requests = Deserializer::from_reader(reader).into_iter::<Request>();

    for request in requests {
        let request = request?;
        debug!("Received request from {}: {:?}", peer_addr, request);

        let response = match request {
            Request::Publish { topic, body } => {
                match router.dispatch(pool, Message::new(topic, body)) {
                    Ok(()) => Response::Ok(None),
                    Err(e) => Response::Err(e.to_string()),
                }
            }
            Request::Ping => Response::Ok(Some("pong".to_owned())),
            Request::Stats => match &stats {
                Some(stats) => Response::Ok(Some(serde_json::to_string(&stats())?)),
                None => Response::Err("stats are not available".to_owned()),
            },
        };

        serde_json::to_writer(&mut writer, &response)?;
        writer.flush()?;
    }

    Ok(())
}
