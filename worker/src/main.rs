use std::io;

use comms::{OnoReceiver, OnoSender};
use log::{error, info};
use mixture::HostEngine;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    signal,
};

use worker::{Worker, WorkerConfig};

#[tokio::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    let cfg = WorkerConfig::from_env()?;
    let worker = Worker::new(cfg.clone(), HostEngine::new());
    info!(host = cfg.host_name(); "worker starting");

    match cfg.addr() {
        Some(addr) => {
            let stream = TcpStream::connect(addr).await?;
            let (rx, tx) = stream.into_split();
            info!("connected to coordinator at {addr}");
            serve(worker, comms::channel(rx, tx)).await
        }
        None => {
            info!("serving the coordinator over standard streams");
            serve(worker, comms::channel(tokio::io::stdin(), tokio::io::stdout())).await
        }
    }
}

async fn serve<R, W>(
    mut worker: Worker<HostEngine>,
    (rx, tx): (OnoReceiver<R>, OnoSender<W>),
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tokio::select! {
        ret = worker.run(rx, tx) => {
            if let Err(e) = &ret {
                error!("aborting on protocol violation: {e}");
            }

            ret?;
            info!("wrapping up, disconnecting...");
        }
        _ = signal::ctrl_c() => {
            info!("received SIGINT");
        }
    }

    Ok(())
}
