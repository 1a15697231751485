use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use jobpool::{JobClient, JobServer, Message, Pool, PoolConfig, PoolError, Result, Router};

fn start_server() -> Result<(SocketAddr, Arc<Pool>, mpsc::Receiver<Message>)> {
    start_server_with(
        PoolConfig::default()
            .pool_size(16)
            .worker_max_open(8)
            .worker_idle(2),
    )
}

/// Starts a server on an ephemeral port. Handled messages are forwarded
/// to the returned receiver.
fn start_server_with(
    config: PoolConfig,
) -> Result<(SocketAddr, Arc<Pool>, mpsc::Receiver<Message>)> {
    let (tx, rx) = mpsc::channel();
    let tx: Arc<Mutex<Sender<Message>>> = Arc::new(Mutex::new(tx));
    let router = Router::new().register("orders", move |message| {
        let _ = tx.lock().unwrap().send(message);
    });

    let pool = Arc::new(Pool::new(config)?);
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    let gauges = pool.clone();
    let server = JobServer::new(router, pool.clone()).with_stats(move || gauges.stats());
    thread::spawn(move || server.serve(listener));

    Ok((addr, pool, rx))
}

#[test]
fn ping_answers_pong() -> Result<()> {
    let (addr, _pool, _rx) = start_server()?;
    let mut client = JobClient::connect(addr)?;
    assert_eq!(client.ping()?, "pong");
    assert_eq!(client.ping()?, "pong");
    Ok(())
}

#[test]
fn published_messages_reach_their_handler() -> Result<()> {
    let (addr, _pool, rx) = start_server()?;
    let mut client = JobClient::connect(addr)?;

    for i in 0..10 {
        client.publish("orders".to_owned(), format!("order-{i}"))?;
    }

    let mut bodies: Vec<String> = (0..10)
        .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap().body)
        .collect();
    bodies.sort();
    let mut expected: Vec<String> = (0..10).map(|i| format!("order-{i}")).collect();
    expected.sort();
    assert_eq!(bodies, expected);
    Ok(())
}

#[test]
fn unknown_topic_is_reported_to_client() -> Result<()> {
    let (addr, _pool, rx) = start_server()?;
    let mut client = JobClient::connect(addr)?;

    match client.publish("refunds".to_owned(), "r-1".to_owned()) {
        Err(PoolError::StringError(msg)) => assert!(msg.contains("refunds"), "{msg}"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    // The connection stays usable after an error.
    assert_eq!(client.ping()?, "pong");
    Ok(())
}

#[test]
fn stats_reflect_pool_gauges() -> Result<()> {
    let (addr, pool, _rx) = start_server()?;
    let mut client = JobClient::connect(addr)?;

    let stats = client.stats()?;
    assert!(stats.alive);
    assert_eq!(stats.job_queue_len, 0);
    // Connections are not pool jobs.
    assert_eq!(stats.working_job_count, 0);
    assert_eq!(stats.worker_count, 2);
    assert!(stats.worker_count <= pool.config().get_worker_max_open());
    Ok(())
}

#[test]
fn publish_is_handled_while_clients_stay_connected() -> Result<()> {
    let (addr, pool, rx) = start_server_with(
        PoolConfig::default()
            .pool_size(4)
            .worker_max_open(2)
            .worker_idle(1),
    )?;

    // More open connections than the pool has workers.
    let mut clients = (0..3)
        .map(|_| JobClient::connect(addr))
        .collect::<Result<Vec<_>>>()?;
    for client in &mut clients {
        assert_eq!(client.ping()?, "pong");
    }

    clients[0].publish("orders".to_owned(), "o-1".to_owned())?;
    let message = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("published message never handled");
    assert_eq!(message.body, "o-1");

    pool.wait();
    let stats = clients[2].stats()?;
    assert_eq!(stats.working_job_count, 0);
    assert!(stats.worker_count <= 2);
    Ok(())
}
