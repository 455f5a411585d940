use anyhow::Result;
use poolbridge::mock::{MockConfig, MockPool};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

struct PoolClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl PoolClient {
    async fn connect(addr: std::net::SocketAddr) -> Result<Self> {
        let (reader, writer) = TcpStream::connect(addr).await?.into_split();

        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    async fn send(&mut self, msg: &Value) -> Result<()> {
        let mut msg_str = msg.to_string();
        msg_str.push('\n');
        self.writer.write_all(msg_str.as_bytes()).await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Value> {
        let mut line = String::new();
        timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await??;
        Ok(serde_json::from_str(&line)?)
    }

    async fn request(&mut self, msg: &Value) -> Result<Value> {
        self.send(msg).await?;
        self.receive().await
    }

    async fn login(&mut self) -> Result<Value> {
        self.request(&json!({
            "id": 1,
            "method": "login",
            "params": {"login": "wallet", "pass": "x", "agent": "test"}
        }))
        .await
    }
}

fn submit(id: u64, session: &Value, job_id: &Value, nonce: &str) -> Value {
    json!({
        "id": id,
        "method": "submit",
        "params": {"id": session, "job_id": job_id, "nonce": nonce, "result": "00ff"}
    })
}

fn no_rotation(accept_rate: f64) -> MockConfig {
    MockConfig {
        accept_rate,
        job_interval_secs: 0,
        ..MockConfig::default()
    }
}

#[tokio::test]
async fn test_mock_pool_lifecycle() -> Result<()> {
    let handle = MockPool::new(MockConfig::default()).start("127.0.0.1:0").await?;

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_login_returns_session_and_job() -> Result<()> {
    let handle = MockPool::new(no_rotation(1.0)).start("127.0.0.1:0").await?;
    let mut client = PoolClient::connect(handle.local_addr).await?;

    let response = client.login().await?;

    assert_eq!(response["id"], 1);
    assert!(response["error"].is_null());
    assert!(response["result"]["id"].is_string());
    assert_eq!(
        response["result"]["job"]["job_id"],
        handle.current_job().await.job_id.as_str()
    );
    assert_eq!(handle.logins(), 1);

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_share_submission() -> Result<()> {
    let handle = MockPool::new(no_rotation(1.0)).start("127.0.0.1:0").await?;
    let mut client = PoolClient::connect(handle.local_addr).await?;

    let login = client.login().await?;
    let session = &login["result"]["id"];
    let job_id = &login["result"]["job"]["job_id"];

    let accepted = client.request(&submit(2, session, job_id, "00000001")).await?;
    assert_eq!(accepted["id"], 2);
    assert_eq!(accepted["result"]["status"], "OK");

    let duplicate = client.request(&submit(3, session, job_id, "00000001")).await?;
    assert_eq!(duplicate["error"]["message"], "Duplicate share");

    let wrong_session = client
        .request(&submit(4, &json!("someone-else"), job_id, "00000002"))
        .await?;
    assert_eq!(wrong_session["error"]["message"], "Unauthenticated");

    let submissions = handle.submissions().await;
    assert_eq!(submissions.len(), 3);
    assert!(submissions[0].accepted);
    assert!(!submissions[1].accepted);

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_rejecting_pool() -> Result<()> {
    let handle = MockPool::new(no_rotation(0.0)).start("127.0.0.1:0").await?;
    let mut client = PoolClient::connect(handle.local_addr).await?;

    let login = client.login().await?;
    let response = client
        .request(&submit(
            2,
            &login["result"]["id"],
            &login["result"]["job"]["job_id"],
            "00000001",
        ))
        .await?;

    assert_eq!(response["error"]["message"], "Low difficulty share");

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_pushed_job_reaches_logged_in_clients() -> Result<()> {
    let handle = MockPool::new(no_rotation(1.0)).start("127.0.0.1:0").await?;
    let mut client = PoolClient::connect(handle.local_addr).await?;

    let login = client.login().await?;
    let first_job = login["result"]["job"]["job_id"].clone();

    let pushed = handle.push_job().await;
    let notification = client.receive().await?;

    assert_eq!(notification["method"], "job");
    assert_eq!(notification["params"]["job_id"], pushed.job_id.as_str());

    // the superseded job is still accepted
    let response = client
        .request(&submit(2, &login["result"]["id"], &first_job, "00000001"))
        .await?;
    assert_eq!(response["result"]["status"], "OK");

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_disconnect_all_closes_connections() -> Result<()> {
    let handle = MockPool::new(no_rotation(1.0)).start("127.0.0.1:0").await?;
    let mut client = PoolClient::connect(handle.local_addr).await?;
    client.login().await?;

    handle.disconnect_all();

    let mut line = String::new();
    let read = timeout(Duration::from_secs(5), client.reader.read_line(&mut line)).await??;
    assert_eq!(read, 0);

    // the listener stays up
    let mut again = PoolClient::connect(handle.local_addr).await?;
    again.login().await?;
    assert_eq!(handle.logins(), 2);

    handle.shutdown().await?;
    Ok(())
}
