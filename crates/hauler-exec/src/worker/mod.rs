//! Worker side of the protocol: runs one job body inside the worker process.
use std::{future::Future, pin::Pin};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::mpsc,
};
use tracing::{debug, info, trace, warn};

use hauler_core::body::{BodyOutcome, BodyRegistry, JobContext, drive_body};
use hauler_model::{StartPayload, StatusPayload, SupervisorMessage, WorkerMessage};

use crate::{
    ExecError,
    codec::{decode_line, encode_line},
};

type BodyFuture = Pin<Box<dyn Future<Output = BodyOutcome> + Send>>;

struct ActiveJob {
    ctx: JobContext,
    body: Option<BodyFuture>,
}

/// Serve the supervisor on `reader`/`writer` until `shutdown` or end of input.
///
/// Announces itself with `alive`, runs the job received in `start`, forwards the body's logs
/// and events as they happen, and finishes with `raised` or `end`.
pub async fn run_worker<R, W>(
    registry: &BodyRegistry,
    reader: R,
    writer: W,
) -> Result<(), ExecError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut writer = writer;
    let (outbox_tx, mut outbox) = mpsc::unbounded_channel::<WorkerMessage>();
    let mut active: Option<ActiveJob> = None;

    send(&mut writer, &WorkerMessage::Alive).await?;

    loop {
        tokio::select! {
            biased;
            Some(msg) = outbox.recv() => send(&mut writer, &msg).await?,
            outcome = next_outcome(&mut active) => {
                while let Ok(msg) = outbox.try_recv() {
                    send(&mut writer, &msg).await?;
                }
                let raised = active.as_ref().is_some_and(|job| job.ctx.is_raised());
                if let Some(job) = active.as_mut() {
                    job.body = None;
                }
                debug!(?outcome, "job body finished");
                let last = if raised { WorkerMessage::Raised } else { WorkerMessage::Ended };
                send(&mut writer, &last).await?;
            }
            line = lines.next_line() => {
                let line = match line? {
                    Some(line) => line,
                    None => {
                        debug!("supervisor closed input; exiting");
                        break;
                    }
                };
                let msg = match decode_line::<SupervisorMessage>(&line) {
                    Ok(Some(msg)) => msg,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(error = %e, "ignoring undecodable supervisor message");
                        continue;
                    }
                };
                trace!(msg = msg.name(), "<- supervisor");
                match msg {
                    SupervisorMessage::Start(start) => {
                        if active.is_some() {
                            warn!("duplicate start ignored");
                            continue;
                        }
                        let job = begin(registry, start, outbox_tx.clone(), &mut writer).await?;
                        active = Some(job);
                    }
                    SupervisorMessage::Raise(reason) => {
                        // No borrow of `active` may live across the await below.
                        let running = match active.as_ref() {
                            Some(job) if job.body.is_some() => {
                                info!(%reason, "job raised");
                                job.ctx.raise(reason);
                                true
                            }
                            _ => false,
                        };
                        if !running {
                            send(&mut writer, &WorkerMessage::Raised).await?;
                        }
                    }
                    SupervisorMessage::Shutdown => {
                        debug!("shutdown requested");
                        break;
                    }
                }
            }
        }
    }

    writer.flush().await?;
    Ok(())
}

/// Build the body for the started job and acknowledge `start`.
///
/// An unsupported kind is reported as a failed job right after the acknowledgement.
async fn begin<W>(
    registry: &BodyRegistry,
    start: StartPayload,
    outbox: mpsc::UnboundedSender<WorkerMessage>,
    writer: &mut W,
) -> Result<ActiveJob, ExecError>
where
    W: AsyncWrite + Unpin,
{
    let StartPayload { job, server } = start;
    info!(job = job.job_id, kind = %job.job_kind, "starting job body");

    let built = registry.build(&job);
    let ctx = JobContext::new(job, server, outbox);
    send(writer, &WorkerMessage::Started).await?;

    let body = match built {
        Ok(mut body) => {
            let ctx = ctx.clone();
            let fut: BodyFuture = Box::pin(async move { drive_body(body.as_mut(), &ctx).await });
            Some(fut)
        }
        Err(e) => {
            warn!(error = %e, "cannot run job");
            send(writer, &WorkerMessage::Event(StatusPayload::failed(e.to_string()))).await?;
            send(writer, &WorkerMessage::Ended).await?;
            None
        }
    };
    Ok(ActiveJob { ctx, body })
}

async fn next_outcome(active: &mut Option<ActiveJob>) -> BodyOutcome {
    match active.as_mut().and_then(|job| job.body.as_mut()) {
        Some(body) => body.await,
        None => std::future::pending().await,
    }
}

async fn send<W>(writer: &mut W, msg: &WorkerMessage) -> Result<(), ExecError>
where
    W: AsyncWrite + Unpin,
{
    trace!(msg = msg.name(), "-> supervisor");
    let line = encode_line(msg)?;
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
