use comms::{Msg, OnoReceiver, OnoSender, tags};
use log::{debug, info};
use mixture::Engine;
use ndarray::Array2;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    time,
};

use crate::{
    Result, WorkerConfig, WorkerContext,
    descriptor::{Descriptor, RegisterParams, TaskHeader, expect_len, non_negative},
    encoder,
    executor::SubTask,
};

/// Worker runtime, serves the coordinator's tasks one at a time until told to stop.
pub struct Worker<E: Engine> {
    cfg: WorkerConfig,
    ctx: WorkerContext<E>,
}

impl<E: Engine> Worker<E> {
    /// Creates a new worker.
    ///
    /// # Args
    /// * `cfg` - The worker's settings.
    /// * `engine` - The engine to run computations on, bound on the first registration.
    ///
    /// # Returns
    /// A new worker instance.
    pub fn new(cfg: WorkerConfig, engine: E) -> Self {
        Self {
            cfg,
            ctx: WorkerContext::new(engine),
        }
    }

    pub fn context(&self) -> &WorkerContext<E> {
        &self.ctx
    }

    /// Serves tasks until the kill header arrives, then disconnects.
    ///
    /// # Args
    /// * `rx` - Receiving end of the coordinator channel.
    /// * `tx` - Sending end of the coordinator channel.
    ///
    /// # Returns
    /// Returns `Ok(())` after a kill header.
    ///
    /// # Errors
    /// Returns `WorkerErr` on I/O failures, engine failures or protocol violations. Nothing
    /// else is sent once an error occurs.
    pub async fn run<R, W>(&mut self, mut rx: OnoReceiver<R>, mut tx: OnoSender<W>) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            match self.await_header(&mut rx).await? {
                TaskHeader::Kill => {
                    info!("kill received, disconnecting");
                    break;
                }
                TaskHeader::Register => self.handle_register(&mut rx, &mut tx).await?,
                TaskHeader::Batch => self.handle_batch(&mut rx, &mut tx).await?,
            }
        }

        tx.disconnect().await?;
        Ok(())
    }

    /// Sleeps between non blocking checks until a header can be received.
    async fn await_header<R>(&self, rx: &mut OnoReceiver<R>) -> Result<TaskHeader>
    where
        R: AsyncRead + Unpin,
    {
        while !rx.probe(tags::TASK)? {
            time::sleep(self.cfg.poll_interval()).await;
        }

        let code = recv_scalar(rx, tags::TASK, "task header").await?;
        TaskHeader::try_from(code)
    }

    async fn handle_register<R, W>(
        &mut self,
        rx: &mut OnoReceiver<R>,
        tx: &mut OnoSender<W>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let host_name = self.cfg.host_name().as_bytes();
        tx.send(tags::HOST_NAME_LEN, &Msg::Int(&[host_name.len() as i32]))
            .await?;
        tx.send(tags::HOST_NAME, &Msg::Char(host_name)).await?;

        let raw = rx.recv_ints(tags::CONTROL).await?;
        let params = RegisterParams::parse(&raw)?;
        debug!(rows = params.rows, cols = params.cols, device = params.device; "registration received");

        self.ctx.prepare(&params)?;

        let data = rx.recv_doubles(tags::DATA).await?;
        expect_len("dataset", data.len(), params.data_len())?;
        let host = Array2::from_shape_vec((params.rows, params.cols), data)?;

        let index = self.ctx.register(host)?;
        tx.send(tags::DATASET_INDEX, &Msg::Int(&[index as i32]))
            .await?;

        Ok(())
    }

    async fn handle_batch<R, W>(
        &mut self,
        rx: &mut OnoReceiver<R>,
        tx: &mut OnoSender<W>,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let count = recv_scalar(rx, tags::CONTROL, "sub-task count").await?;
        let count = non_negative("sub-task count", count)?;

        // Every sub-task is received before any of them runs.
        let mut tasks = Vec::with_capacity(count);
        for _ in 0..count {
            tasks.push(self.recv_subtask(rx).await?);
        }

        debug!(subtasks = count; "batch received");
        let results = self.ctx.run_batch(&tasks)?;
        encoder::send_results(tx, &results).await?;

        Ok(())
    }

    async fn recv_subtask<R>(&self, rx: &mut OnoReceiver<R>) -> Result<SubTask>
    where
        R: AsyncRead + Unpin,
    {
        let raw = rx.recv_ints(tags::DATA).await?;
        let descriptor = Descriptor::parse(&raw)?;
        let layout = descriptor.layout(self.ctx.registry())?;

        let weights = rx.recv_doubles(tags::WEIGHTS).await?;
        let means = rx.recv_doubles(tags::MEANS).await?;
        let covs = rx.recv_doubles(tags::COVARIANCES).await?;

        SubTask::from_buffers(descriptor, layout, weights, means, covs)
    }
}

async fn recv_scalar<R>(rx: &mut OnoReceiver<R>, tag: comms::Tag, what: &'static str) -> Result<i32>
where
    R: AsyncRead + Unpin,
{
    let raw = rx.recv_ints(tag).await?;
    expect_len(what, raw.len(), 1)?;
    Ok(raw[0])
}
