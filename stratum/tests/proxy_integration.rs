use anyhow::Result;
use futures::{SinkExt, StreamExt};
use poolbridge::Config;
use poolbridge::Listener;
use poolbridge::mock::{MockConfig, MockPool, MockPoolHandle};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Proxy {
    addr: SocketAddr,
    pool: MockPoolHandle,
}

async fn start_proxy(accept_rate: f64) -> Result<Proxy> {
    let pool = MockPool::new(MockConfig {
        accept_rate,
        job_interval_secs: 0,
        ..MockConfig::default()
    })
    .start("127.0.0.1:0")
    .await?;

    let mut config = Config::default();
    config.server.bind_address = "127.0.0.1:0".parse()?;
    config.pool.host = pool.local_addr.ip().to_string();
    config.pool.port = pool.local_addr.port();
    config.pool.wallet = "47ocfRVLCp71ZtNvdrxtAR85VDbNdmUMph5mNWfRf3z2FuRhPFJVm7c".to_string();
    config.limiter.reconnect_delay_secs = 1;

    let listener = Listener::new(Arc::new(config)).await?;
    let addr = listener.local_addr()?;
    tokio::spawn(listener.accept());

    Ok(Proxy { addr, pool })
}

async fn connect(proxy: &Proxy) -> Result<Socket> {
    let (socket, _) = connect_async(format!("ws://{}/proxy", proxy.addr)).await?;
    Ok(socket)
}

/// Next JSON message, skipping control frames
async fn next_message(socket: &mut Socket) -> Result<Value> {
    loop {
        let frame = timeout(Duration::from_secs(5), socket.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("socket closed"))??;

        if let Message::Text(text) = frame {
            return Ok(serde_json::from_str(text.as_str())?);
        }
    }
}

async fn expect_silence(socket: &mut Socket) {
    let waited = timeout(Duration::from_millis(300), async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return text.to_string(),
                Some(Ok(_)) => continue,
                _ => return String::new(),
            }
        }
    })
    .await;

    assert!(waited.is_err(), "unexpected message: {:?}", waited);
}

async fn send(socket: &mut Socket, message: Value) -> Result<()> {
    socket.send(Message::Text(message.to_string().into())).await?;
    Ok(())
}

/// Wait for `authed` followed by a job, returning the job id
async fn expect_work(socket: &mut Socket) -> Result<String> {
    let authed = next_message(socket).await?;
    assert_eq!(authed, json!({"type": "authed", "params": {"hashes": 0}}));

    let job = next_message(socket).await?;
    assert_eq!(job["type"], "job");

    Ok(job["params"]["job_id"].as_str().unwrap_or_default().to_string())
}

fn submit(job_id: &str, nonce: &str) -> Value {
    json!({"type": "submit", "params": {"job_id": job_id, "nonce": nonce, "result": "00ff"}})
}

async fn http_get(addr: SocketAddr, path: &str) -> Result<(u16, String)> {
    let mut stream = TcpStream::connect(addr).await?;
    stream
        .write_all(
            format!(
                "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
                path, addr
            )
            .as_bytes(),
        )
        .await?;

    let mut raw = String::new();
    timeout(Duration::from_secs(5), stream.read_to_string(&mut raw)).await??;

    let status = raw
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or(0);
    let body = raw
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();

    Ok((status, body))
}

#[tokio::test]
async fn test_clients_share_one_pool_session() -> Result<()> {
    let proxy = start_proxy(1.0).await?;

    let mut first = connect(&proxy).await?;
    let job_id = expect_work(&mut first).await?;
    assert_eq!(job_id, proxy.pool.current_job().await.job_id);

    let mut second = connect(&proxy).await?;
    assert_eq!(expect_work(&mut second).await?, job_id);

    assert_eq!(proxy.pool.logins(), 1);
    assert_eq!(proxy.pool.connections().await, 1);

    Ok(())
}

#[tokio::test]
async fn test_accepted_share_reaches_every_client() -> Result<()> {
    let proxy = start_proxy(1.0).await?;

    let mut first = connect(&proxy).await?;
    let job_id = expect_work(&mut first).await?;
    let mut second = connect(&proxy).await?;
    expect_work(&mut second).await?;

    send(&mut first, submit(&job_id, "00000001")).await?;

    let accepted = json!({"type": "hash_accepted", "params": {"hashes": 1}});
    assert_eq!(next_message(&mut first).await?, accepted);
    assert_eq!(next_message(&mut second).await?, accepted);

    let submissions = proxy.pool.submissions().await;
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].submission.job_id, job_id);

    let (status, body) = http_get(proxy.addr, "/api/stats").await?;
    assert_eq!(status, 200);

    let stats: Value = serde_json::from_str(&body)?;
    assert_eq!(stats["mining"]["accepted_shares"], 1);
    assert_eq!(stats["mining"]["total_shares"], 1);
    assert_eq!(stats["miners"]["active"], 2);
    assert_eq!(stats["miners"]["list"][0]["hashes"], 1);
    assert_eq!(stats["pool"]["authenticated"], true);
    assert_eq!(stats["pool"]["wallet"], "47ocfRVL...hPFJVm7c");

    Ok(())
}

#[tokio::test]
async fn test_rejection_reaches_every_client() -> Result<()> {
    let proxy = start_proxy(0.0).await?;

    let mut first = connect(&proxy).await?;
    let job_id = expect_work(&mut first).await?;
    let mut second = connect(&proxy).await?;
    expect_work(&mut second).await?;

    send(&mut second, submit(&job_id, "00000001")).await?;

    let rejected = json!({"type": "error", "params": {"error": "Low difficulty share"}});
    assert_eq!(next_message(&mut first).await?, rejected);
    assert_eq!(next_message(&mut second).await?, rejected);

    Ok(())
}

#[tokio::test]
async fn test_superseded_job_still_forwarded() -> Result<()> {
    let proxy = start_proxy(1.0).await?;

    let mut socket = connect(&proxy).await?;
    let old_job = expect_work(&mut socket).await?;

    let pushed = proxy.pool.push_job().await;
    let job = next_message(&mut socket).await?;
    assert_eq!(job["type"], "job");
    assert_eq!(job["params"]["job_id"], pushed.job_id.as_str());

    send(&mut socket, submit(&old_job, "00000002")).await?;
    assert_eq!(next_message(&mut socket).await?["type"], "hash_accepted");

    let submissions = proxy.pool.submissions().await;
    assert_eq!(submissions[0].submission.job_id, old_job);

    Ok(())
}

#[tokio::test]
async fn test_unknown_job_answered_to_submitter_only() -> Result<()> {
    let proxy = start_proxy(1.0).await?;

    let mut first = connect(&proxy).await?;
    expect_work(&mut first).await?;
    let mut second = connect(&proxy).await?;
    expect_work(&mut second).await?;

    send(&mut first, submit("not-a-job", "00000003")).await?;

    assert_eq!(
        next_message(&mut first).await?,
        json!({"type": "error", "params": {"error": "Unknown job: not-a-job"}})
    );
    expect_silence(&mut second).await;
    assert!(proxy.pool.submissions().await.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_ping_and_malformed_messages() -> Result<()> {
    let proxy = start_proxy(1.0).await?;

    let mut socket = connect(&proxy).await?;
    expect_work(&mut socket).await?;

    socket.send(Message::Text("{not json".into())).await?;
    send(&mut socket, json!({"type": "ping"})).await?;

    assert_eq!(next_message(&mut socket).await?, json!({"type": "pong"}));

    Ok(())
}

#[tokio::test]
async fn test_reconnects_after_pool_drop() -> Result<()> {
    let proxy = start_proxy(1.0).await?;

    let mut socket = connect(&proxy).await?;
    expect_work(&mut socket).await?;

    proxy.pool.disconnect_all();

    // the new login job is broadcast once the proxy is back
    let job_id = expect_work(&mut socket).await?;
    assert_eq!(job_id, proxy.pool.current_job().await.job_id);
    assert_eq!(proxy.pool.logins(), 2);

    Ok(())
}

#[tokio::test]
async fn test_http_endpoints() -> Result<()> {
    let proxy = start_proxy(1.0).await?;

    let (status, body) = http_get(proxy.addr, "/health").await?;
    assert_eq!(status, 200);
    let health: Value = serde_json::from_str(&body)?;
    assert_eq!(health["status"], "ok");
    assert!(health["uptime"].is_u64());

    let (status, _) = http_get(proxy.addr, "/nope").await?;
    assert_eq!(status, 404);

    // give the startup connect a moment before reading pool state
    sleep(Duration::from_millis(200)).await;
    let (_, body) = http_get(proxy.addr, "/api/stats").await?;
    let stats: Value = serde_json::from_str(&body)?;
    assert_eq!(stats["pool"]["connected"], true);
    assert_eq!(stats["miners"]["active"], 0);

    let (ws, _) = connect_async(format!("ws://{}/ws", proxy.addr)).await?;
    drop(ws);

    Ok(())
}
