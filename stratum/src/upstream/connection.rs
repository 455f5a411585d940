use std::time::Instant;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

use crate::protocol::{PoolMessage, PoolParser};

/// Longest line accepted from the pool
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Request to open a pool connection for a given generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub generation: u64,
    pub address: String,
}

/// Events emitted by the pool I/O task, tagged with the generation of the
/// connection that produced them.
#[derive(Debug)]
pub enum UpstreamEvent {
    Connected {
        generation: u64,
        writer: mpsc::UnboundedSender<String>,
    },
    Message {
        generation: u64,
        message: PoolMessage,
    },
    Disconnected {
        generation: u64,
        reason: String,
    },
    /// Backoff elapsed after a disconnect
    ReconnectDue,
}

pub type UpstreamEventSender = mpsc::UnboundedSender<UpstreamEvent>;

/// Seam between the router and the socket layer
pub trait Connector: Send {
    fn connect(&self, request: ConnectRequest, events: UpstreamEventSender);
}

/// Opens real TCP connections
#[derive(Debug, Default, Clone)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect(&self, request: ConnectRequest, events: UpstreamEventSender) {
        spawn(request, events);
    }
}

/// Run one pool connection until either side closes.
///
/// Lines written to the `writer` handed out in [`UpstreamEvent::Connected`]
/// go to the socket verbatim. Dropping every clone of that sender closes
/// the connection.
pub fn spawn(request: ConnectRequest, events: UpstreamEventSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        let generation = request.generation;
        let start = Instant::now();

        let stream = match TcpStream::connect(&request.address).await {
            Ok(stream) => stream,
            Err(e) => {
                metrics::counter!("network_connection_failed_total").increment(1);
                tracing::error!(
                    "[pool] failed to connect to {}: {} in {:#.3?}",
                    request.address,
                    e,
                    start.elapsed()
                );

                let _ = events.send(UpstreamEvent::Disconnected {
                    generation,
                    reason: e.to_string(),
                });
                return;
            }
        };

        let latency = start.elapsed();
        metrics::histogram!("network_pool_latency").record(latency.as_secs_f64());
        tracing::info!(
            "[pool] connected to {} in {:#.3?}",
            request.address,
            latency
        );

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("[pool] failed to set TCP_NODELAY: {}", e);
        }

        let (reader, writer) = stream.into_split();
        let (line_tx, line_rx) = mpsc::unbounded_channel();

        if events
            .send(UpstreamEvent::Connected {
                generation,
                writer: line_tx,
            })
            .is_err()
        {
            return;
        }

        let reason = tokio::select! {
            reason = read_loop(reader, generation, &events) => reason,
            reason = write_loop(writer, line_rx) => reason,
        };

        tracing::warn!("[pool] connection to {} closed: {}", request.address, reason);

        let _ = events.send(UpstreamEvent::Disconnected { generation, reason });
    })
}

async fn read_loop(reader: OwnedReadHalf, generation: u64, events: &UpstreamEventSender) -> String {
    let parser = PoolParser::new();
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                return format!("line exceeded {} bytes", MAX_LINE_LENGTH);
            }
            Err(LinesCodecError::Io(e)) => return e.to_string(),
        };

        metrics::counter!("pool_messages_received_total").increment(1);

        match parser.parse_line(&line) {
            Ok(Some(message)) => {
                if events
                    .send(UpstreamEvent::Message {
                        generation,
                        message,
                    })
                    .is_err()
                {
                    return "router stopped".to_string();
                }
            }
            Ok(None) => tracing::trace!("[pool] ignored line: {}", line),
            Err(e) => tracing::warn!("[pool] skipping unparseable line: {}", e),
        }
    }

    "closed by pool".to_string()
}

async fn write_loop(mut writer: OwnedWriteHalf, mut lines: mpsc::UnboundedReceiver<String>) -> String {
    while let Some(line) = lines.recv().await {
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            return e.to_string();
        }

        tracing::trace!("[pool] -> {}", line.trim_end());
    }

    let _ = writer.shutdown().await;

    "closed by proxy".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<UpstreamEvent>) -> UpstreamEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_fragmented_lines_are_reassembled() {
        let pool = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = pool.local_addr().unwrap().to_string();
        let (tx, mut rx) = mpsc::unbounded_channel();

        spawn(
            ConnectRequest {
                generation: 7,
                address,
            },
            tx,
        );

        let (mut socket, _) = pool.accept().await.unwrap();

        let writer = match next_event(&mut rx).await {
            UpstreamEvent::Connected { generation, writer } => {
                assert_eq!(generation, 7);
                writer
            }
            other => panic!("unexpected event: {:?}", other),
        };

        writer.send("{\"id\":1}\n".to_string()).unwrap();

        let (read_half, mut write_half) = socket.split();
        let mut received = String::new();
        BufReader::new(read_half)
            .read_line(&mut received)
            .await
            .unwrap();
        assert_eq!(received, "{\"id\":1}\n");

        write_half
            .write_all(br#"{"id":1,"result":{"id":"w1","job":{"job_id":"j1","#)
            .await
            .unwrap();
        write_half.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        write_half
            .write_all(
                b"\"blob\":\"ab\",\"target\":\"ff\"},\"status\":\"OK\"}}\nnot json\n{\"method\":\"job\",\"params\":{\"job_id\":\"j2\",\"blob\":\"cd\",\"target\":\"ff\"}}\n",
            )
            .await
            .unwrap();

        match next_event(&mut rx).await {
            UpstreamEvent::Message {
                generation: 7,
                message: PoolMessage::LoginResult { id, job, .. },
            } => {
                assert_eq!(id, 1);
                assert_eq!(job, Job::new("j1", "ab", "ff"));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        // the garbage line is skipped, the stream keeps going
        match next_event(&mut rx).await {
            UpstreamEvent::Message {
                message: PoolMessage::Job(job),
                ..
            } => assert_eq!(job.job_id, "j2"),
            other => panic!("unexpected event: {:?}", other),
        }

        drop(socket);

        match next_event(&mut rx).await {
            UpstreamEvent::Disconnected { generation, .. } => assert_eq!(generation, 7),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_failure_reports_disconnect() {
        let pool = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = pool.local_addr().unwrap().to_string();
        drop(pool);

        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn(
            ConnectRequest {
                generation: 3,
                address,
            },
            tx,
        );

        match next_event(&mut rx).await {
            UpstreamEvent::Disconnected { generation, .. } => assert_eq!(generation, 3),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
