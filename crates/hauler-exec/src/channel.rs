//! Supervisor-side view of one worker: outbound commands, inbound signals and a kill lease.
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, trace, warn};

use hauler_model::{JobDescription, JobId, SupervisorMessage, WorkerMessage};

use crate::{
    ExecError,
    codec::{decode_line, encode_line},
};

/// Starts worker processes.
pub trait WorkerSpawner: Send + Sync {
    /// Start a worker for `job`. Must be called from within a tokio runtime.
    fn spawn(&self, job: &JobDescription) -> Result<WorkerChannel, ExecError>;
}

/// Something the supervisor observed about its worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerSignal {
    Message(WorkerMessage),
    /// The worker process exited. `code` is `None` when killed by a signal.
    Exited { code: Option<i32> },
    /// A line from the worker could not be decoded.
    Protocol(ExecError),
}

/// Permission to keep the worker process alive.
///
/// [`kill`](Self::kill) or dropping the lease asks the spawner to kill the process.
#[derive(Debug)]
pub struct WorkerLease {
    kill: Option<oneshot::Sender<()>>,
}

impl WorkerLease {
    /// Lease plus the receiver the spawner watches for kill requests.
    ///
    /// The receiver resolves with `Ok(())` on [`kill`](Self::kill) and with an error once the
    /// lease is dropped.
    pub fn pair() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { kill: Some(tx) }, rx)
    }

    pub fn kill(&mut self) {
        if let Some(tx) = self.kill.take() {
            let _ = tx.send(());
        }
    }
}

/// Connection to one worker.
#[derive(Debug)]
pub struct WorkerChannel {
    pub outbound: mpsc::UnboundedSender<SupervisorMessage>,
    pub inbound: mpsc::UnboundedReceiver<WorkerSignal>,
    pub lease: WorkerLease,
}

impl WorkerChannel {
    /// Speak the line protocol over an arbitrary byte stream pair.
    ///
    /// `reader` carries worker messages, `writer` receives supervisor messages. The inbound side
    /// closes when `reader` reaches EOF. No [`WorkerSignal::Exited`] is ever produced.
    pub fn over_io<R, W>(job_id: JobId, reader: R, writer: W, lease: WorkerLease) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pumps = IoPumps::start(job_id, reader, writer);
        Self {
            outbound: pumps.outbound,
            inbound: pumps.inbound,
            lease,
        }
    }
}

/// Reader and writer tasks bridging a byte stream pair to message channels.
pub(crate) struct IoPumps {
    pub outbound: mpsc::UnboundedSender<SupervisorMessage>,
    pub inbound: mpsc::UnboundedReceiver<WorkerSignal>,
    /// Extra sender for signals produced outside the reader (process exit).
    pub signals: mpsc::UnboundedSender<WorkerSignal>,
    /// Finishes once the reader has hit EOF and forwarded everything before it.
    pub reader: JoinHandle<()>,
}

impl IoPumps {
    pub fn start<R, W>(job_id: JobId, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (sig_tx, sig_rx) = mpsc::unbounded_channel();

        tokio::spawn(write_messages(job_id, writer, out_rx));
        let reader = tokio::spawn(read_signals(job_id, reader, sig_tx.clone()));

        Self {
            outbound: out_tx,
            inbound: sig_rx,
            signals: sig_tx,
            reader,
        }
    }
}

async fn write_messages<W>(
    job_id: JobId,
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<SupervisorMessage>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = rx.recv().await {
        trace!(job = job_id, msg = msg.name(), "-> worker");
        let line = match encode_line(&msg) {
            Ok(line) => line,
            Err(e) => {
                warn!(job = job_id, error = %e, "failed to encode supervisor message");
                continue;
            }
        };
        let res = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = res {
            debug!(job = job_id, error = %e, "worker input closed");
            return;
        }
    }
    let _ = writer.shutdown().await;
}

async fn read_signals<R>(job_id: JobId, reader: R, tx: mpsc::UnboundedSender<WorkerSignal>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!(job = job_id, error = %e, "worker output read failed");
                break;
            }
        };
        let signal = match decode_line::<WorkerMessage>(&line) {
            Ok(Some(msg)) => {
                trace!(job = job_id, msg = msg.name(), "<- worker");
                WorkerSignal::Message(msg)
            }
            Ok(None) => continue,
            Err(e) => {
                warn!(job = job_id, error = %e, "undecodable worker output");
                WorkerSignal::Protocol(e)
            }
        };
        if tx.send(signal).is_err() {
            break;
        }
    }
    trace!(job = job_id, "worker output closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};

    #[tokio::test]
    async fn over_io_bridges_both_directions() {
        let (sup_side, worker_side) = duplex(1024);
        let (sup_read, sup_write) = tokio::io::split(sup_side);
        let (worker_read, mut worker_write) = tokio::io::split(worker_side);
        let (lease, _kill) = WorkerLease::pair();

        let mut ch = WorkerChannel::over_io(1, sup_read, sup_write, lease);

        worker_write
            .write_all(b"{\"type\":\"alive\"}\n\nnot json\n")
            .await
            .unwrap();
        assert_eq!(
            ch.inbound.recv().await,
            Some(WorkerSignal::Message(WorkerMessage::Alive))
        );
        assert!(matches!(
            ch.inbound.recv().await,
            Some(WorkerSignal::Protocol(ExecError::Protocol(_)))
        ));

        ch.outbound.send(SupervisorMessage::Shutdown).unwrap();
        let mut lines = BufReader::new(worker_read).lines();
        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("{\"type\":\"shutdown\"}")
        );

        drop(worker_write);
        drop(lines);
        assert_eq!(ch.inbound.recv().await, None);
    }

    #[tokio::test]
    async fn lease_kill_and_drop_both_notify() {
        let (mut lease, rx) = WorkerLease::pair();
        lease.kill();
        assert!(rx.await.is_ok());

        let (lease, rx) = WorkerLease::pair();
        drop(lease);
        assert!(rx.await.is_err());
    }
}
