use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use comms::{Msg, OnoReceiver, OnoSender, Tag, tags};
use mixture::{Engine, HostEngine, HostMatrix};
use ndarray::{Array2, ArrayView1, ArrayView2, ArrayView3};
use rand::RngCore;
use tokio::io::{self, DuplexStream, ReadHalf, WriteHalf};

use worker::{
    Worker, WorkerConfig,
    descriptor::{SubTaskKind, TaskHeader},
};

type Rx = OnoReceiver<ReadHalf<DuplexStream>>;
type Tx = OnoSender<WriteHalf<DuplexStream>>;

/// Delegates to `HostEngine` while counting device initializations.
struct CountingEngine {
    inner: HostEngine,
    inits: Arc<AtomicUsize>,
}

impl Engine for CountingEngine {
    type Matrix = HostMatrix;

    fn init(&mut self, device: usize) -> mixture::Result<()> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        self.inner.init(device)
    }

    fn upload(&self, data: ArrayView2<f64>) -> mixture::Result<HostMatrix> {
        self.inner.upload(data)
    }

    fn mvnpdf_multi(
        &self,
        data: &HostMatrix,
        weights: ArrayView1<f64>,
        means: ArrayView2<f64>,
        covs: ArrayView3<f64>,
    ) -> mixture::Result<HostMatrix> {
        self.inner.mvnpdf_multi(data, weights, means, covs)
    }

    fn sample_discrete(&self, densities: &HostMatrix, rng: &mut dyn RngCore) -> mixture::Result<Vec<i32>> {
        self.inner.sample_discrete(densities, rng)
    }

    fn row_argmax(&self, densities: &HostMatrix) -> mixture::Result<Vec<i32>> {
        self.inner.row_argmax(densities)
    }

    fn download(&self, matrix: &HostMatrix) -> mixture::Result<Array2<f64>> {
        self.inner.download(matrix)
    }
}

fn channel_pair() -> ((Rx, Tx), (Rx, Tx)) {
    let (stream1, stream2) = io::duplex(4096);
    let (rx1, tx1) = io::split(stream1);
    let (rx2, tx2) = io::split(stream2);
    let chan1 = comms::channel(rx1, tx1);
    let chan2 = comms::channel(rx2, tx2);
    (chan1, chan2)
}

fn test_config() -> WorkerConfig {
    WorkerConfig::new("test-node").with_poll_interval(Duration::from_micros(100))
}

/// Three observations close to (-4, -4) followed by three close to (4, 4).
fn clustered_dataset() -> Array2<f64> {
    ndarray::array![
        [-4.1, -3.9],
        [-4.0, -4.2],
        [-3.8, -4.0],
        [4.0, 4.1],
        [3.9, 4.0],
        [4.2, 3.8],
    ]
}

async fn send_header(tx: &mut Tx, header: TaskHeader) -> io::Result<()> {
    tx.send(tags::TASK, &Msg::Int(&[header.code()])).await
}

async fn recv_scalar(rx: &mut Rx, tag: Tag) -> io::Result<i32> {
    let nums = rx.recv_ints(tag).await?;
    assert_eq!(nums.len(), 1, "expected a scalar under tag {tag}");
    Ok(nums[0])
}

/// Walks the coordinator's side of a registration, returns the assigned dataset index.
async fn register(rx: &mut Rx, tx: &mut Tx, data: &Array2<f64>, seed: i32) -> io::Result<i32> {
    send_header(tx, TaskHeader::Register).await?;

    let len = recv_scalar(rx, tags::HOST_NAME_LEN).await?;
    let name = rx.recv_chars(tags::HOST_NAME).await?;
    assert_eq!(len as usize, name.len());
    assert_eq!(name, b"test-node");

    let (rows, cols) = data.dim();
    let params = [rows as i32, cols as i32, 0, seed];
    tx.send(tags::CONTROL, &Msg::Int(&params)).await?;
    tx.send(tags::DATA, &Msg::Double(data.as_slice().unwrap()))
        .await?;

    recv_scalar(rx, tags::DATASET_INDEX).await
}

struct Request {
    dataset: i32,
    kind: SubTaskKind,
    gid: i32,
    weights: Vec<f64>,
    means: Vec<f64>,
    covs: Vec<f64>,
}

impl Request {
    /// Components at (-4, -4) and (4, 4) with unit covariances.
    fn two_components(dataset: i32, kind: SubTaskKind, gid: i32) -> Self {
        Self {
            dataset,
            kind,
            gid,
            weights: vec![0.5, 0.5],
            means: vec![-4., -4., 4., 4.],
            covs: vec![1., 0., 0., 1., 1., 0., 0., 1.],
        }
    }

    fn ncomp(&self) -> i32 {
        self.weights.len() as i32
    }
}

async fn send_batch(tx: &mut Tx, requests: &[Request]) -> io::Result<()> {
    send_header(tx, TaskHeader::Batch).await?;
    tx.send(tags::CONTROL, &Msg::Int(&[requests.len() as i32]))
        .await?;

    for req in requests {
        let descriptor = [req.dataset, req.ncomp(), req.kind.code(), req.gid];
        tx.send(tags::DATA, &Msg::Int(&descriptor)).await?;
        tx.send(tags::WEIGHTS, &Msg::Double(&req.weights)).await?;
        tx.send(tags::MEANS, &Msg::Double(&req.means)).await?;
        tx.send(tags::COVARIANCES, &Msg::Double(&req.covs)).await?;
    }

    Ok(())
}

#[derive(Debug)]
enum Record {
    Statistics {
        nobs: i32,
        totals: Vec<f64>,
        weighted_sums: Vec<f64>,
        responsibilities: Vec<f64>,
        loglik: f64,
        gid: i32,
    },
    Labels {
        nobs: i32,
        labels: Vec<i32>,
        gid: i32,
    },
    Relabel {
        nobs: i32,
        labels: Vec<i32>,
        gid: i32,
        hard: Vec<i32>,
    },
}

/// Demultiplexes the element stream of a batch using the kinds the coordinator sent.
async fn recv_results(rx: &mut Rx, kinds: &[SubTaskKind]) -> io::Result<Vec<Record>> {
    let count = recv_scalar(rx, tags::DATA).await?;
    assert_eq!(count as usize, kinds.len());

    let mut tag = tags::RESULT_BASE;
    let mut next = || {
        let current = tag;
        tag += 1;
        current
    };

    let mut records = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let record = match kind {
            SubTaskKind::Statistics => Record::Statistics {
                nobs: recv_scalar(rx, next()).await?,
                totals: rx.recv_doubles(next()).await?,
                weighted_sums: rx.recv_doubles(next()).await?,
                responsibilities: rx.recv_doubles(next()).await?,
                loglik: rx.recv_doubles(next()).await?[0],
                gid: recv_scalar(rx, next()).await?,
            },
            SubTaskKind::Labels => Record::Labels {
                nobs: recv_scalar(rx, next()).await?,
                labels: rx.recv_ints(next()).await?,
                gid: recv_scalar(rx, next()).await?,
            },
            SubTaskKind::Relabel => Record::Relabel {
                nobs: recv_scalar(rx, next()).await?,
                labels: rx.recv_ints(next()).await?,
                gid: recv_scalar(rx, next()).await?,
                hard: rx.recv_ints(next()).await?,
            },
        };
        records.push(record);
    }

    let used = kinds.iter().map(|k| k.element_count()).sum::<usize>();
    assert_eq!(next(), tags::RESULT_BASE + used as Tag);

    Ok(records)
}

fn assert_close(got: f64, expected: f64) {
    assert!((got - expected).abs() < 1e-9, "got {got}, expected {expected}");
}

#[tokio::test]
async fn kill_first_disconnects_without_output() {
    let ((rx_w, tx_w), (mut rx_c, mut tx_c)) = channel_pair();
    let mut worker = Worker::new(test_config(), HostEngine::new());

    let coordinator = async move {
        send_header(&mut tx_c, TaskHeader::Kill).await?;

        let err = rx_c.recv(tags::DATA).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        Ok::<_, io::Error>(())
    };

    let (worker_ret, coordinator_ret) = tokio::join!(worker.run(rx_w, tx_w), coordinator);
    worker_ret.unwrap();
    coordinator_ret.unwrap();

    assert!(worker.context().registry().is_empty());
}

#[tokio::test]
async fn dataset_indices_increase_across_batches() {
    let ((rx_w, tx_w), (mut rx_c, mut tx_c)) = channel_pair();
    let mut worker = Worker::new(test_config(), HostEngine::new());
    let data = clustered_dataset();

    let coordinator = async move {
        assert_eq!(register(&mut rx_c, &mut tx_c, &data, 1).await?, 0);
        assert_eq!(register(&mut rx_c, &mut tx_c, &data, 2).await?, 1);

        let batch = [Request::two_components(1, SubTaskKind::Labels, 0)];
        send_batch(&mut tx_c, &batch).await?;
        recv_results(&mut rx_c, &[SubTaskKind::Labels]).await?;

        assert_eq!(register(&mut rx_c, &mut tx_c, &data, 3).await?, 2);

        send_header(&mut tx_c, TaskHeader::Kill).await?;
        Ok::<_, io::Error>(())
    };

    let (worker_ret, coordinator_ret) = tokio::join!(worker.run(rx_w, tx_w), coordinator);
    worker_ret.unwrap();
    coordinator_ret.unwrap();

    assert_eq!(worker.context().registry().len(), 3);
}

#[tokio::test]
async fn engine_is_initialized_once() {
    let ((rx_w, tx_w), (mut rx_c, mut tx_c)) = channel_pair();
    let inits = Arc::new(AtomicUsize::new(0));
    let engine = CountingEngine {
        inner: HostEngine::new(),
        inits: Arc::clone(&inits),
    };
    let mut worker = Worker::new(test_config(), engine);
    let data = clustered_dataset();

    let coordinator = async move {
        for seed in 0..3 {
            register(&mut rx_c, &mut tx_c, &data, seed).await?;
        }

        send_header(&mut tx_c, TaskHeader::Kill).await?;
        Ok::<_, io::Error>(())
    };

    let (worker_ret, coordinator_ret) = tokio::join!(worker.run(rx_w, tx_w), coordinator);
    worker_ret.unwrap();
    coordinator_ret.unwrap();

    assert_eq!(inits.load(Ordering::SeqCst), 1);
    assert_eq!(worker.context().engine().inner.device(), Some(0));
}

#[tokio::test]
async fn statistics_are_normalized() {
    let ((rx_w, tx_w), (mut rx_c, mut tx_c)) = channel_pair();
    let mut worker = Worker::new(test_config(), HostEngine::new());
    let data = clustered_dataset();

    let coordinator = async move {
        let index = register(&mut rx_c, &mut tx_c, &data, 7).await?;
        let batch = [Request::two_components(index, SubTaskKind::Statistics, 9)];
        send_batch(&mut tx_c, &batch).await?;

        let mut records = recv_results(&mut rx_c, &[SubTaskKind::Statistics]).await?;
        let Some(Record::Statistics {
            nobs,
            totals,
            weighted_sums,
            responsibilities,
            loglik,
            gid,
        }) = records.pop()
        else {
            panic!("expected a statistics record");
        };

        assert_eq!((nobs, gid), (6, 9));
        assert_eq!(responsibilities.len(), 6 * 2);
        assert_eq!(weighted_sums.len(), 2 * 2);
        assert!(loglik.is_finite());

        let mut col_sums = [0.; 2];
        for row in responsibilities.chunks(2) {
            assert_close(row.iter().sum(), 1.);
            col_sums[0] += row[0];
            col_sums[1] += row[1];
        }
        assert_close(totals[0], col_sums[0]);
        assert_close(totals[1], col_sums[1]);

        // Each cluster is owned by the component sitting on it.
        assert!(totals[0] > 2.99 && totals[1] > 2.99);

        send_header(&mut tx_c, TaskHeader::Kill).await?;
        Ok::<_, io::Error>(())
    };

    let (worker_ret, coordinator_ret) = tokio::join!(worker.run(rx_w, tx_w), coordinator);
    worker_ret.unwrap();
    coordinator_ret.unwrap();
}

#[tokio::test]
async fn single_component_sums_match_the_data() {
    let ((rx_w, tx_w), (mut rx_c, mut tx_c)) = channel_pair();
    let mut worker = Worker::new(test_config(), HostEngine::new());
    let data = clustered_dataset();
    let col_sums = data.sum_axis(ndarray::Axis(0));

    let coordinator = async move {
        let index = register(&mut rx_c, &mut tx_c, &data, 7).await?;
        let batch = [Request {
            dataset: index,
            kind: SubTaskKind::Statistics,
            gid: 0,
            weights: vec![1.],
            means: vec![0., 0.],
            covs: vec![10., 0., 0., 10.],
        }];
        send_batch(&mut tx_c, &batch).await?;

        let records = recv_results(&mut rx_c, &[SubTaskKind::Statistics]).await?;
        let Record::Statistics {
            totals,
            weighted_sums,
            ..
        } = &records[0]
        else {
            panic!("expected a statistics record");
        };

        assert_close(totals[0], 6.);
        assert_close(weighted_sums[0], col_sums[0]);
        assert_close(weighted_sums[1], col_sums[1]);

        send_header(&mut tx_c, TaskHeader::Kill).await?;
        Ok::<_, io::Error>(())
    };

    let (worker_ret, coordinator_ret) = tokio::join!(worker.run(rx_w, tx_w), coordinator);
    worker_ret.unwrap();
    coordinator_ret.unwrap();
}

#[tokio::test]
async fn mixed_batch_keeps_submission_order() {
    let ((rx_w, tx_w), (mut rx_c, mut tx_c)) = channel_pair();
    let mut worker = Worker::new(test_config(), HostEngine::new());
    let data = clustered_dataset();

    let coordinator = async move {
        let index = register(&mut rx_c, &mut tx_c, &data, 11).await?;

        let mut three = Request::two_components(index, SubTaskKind::Labels, 30);
        three.weights = vec![0.4, 0.4, 0.2];
        three.means.extend([0., 0.]);
        three.covs.extend([1., 0., 0., 1.]);

        let batch = [
            Request::two_components(index, SubTaskKind::Relabel, 10),
            Request::two_components(index, SubTaskKind::Statistics, 20),
            three,
        ];
        let kinds: Vec<_> = batch.iter().map(|r| r.kind).collect();
        send_batch(&mut tx_c, &batch).await?;

        let records = recv_results(&mut rx_c, &kinds).await?;
        assert_eq!(records.len(), 3);

        let Record::Relabel {
            nobs,
            labels,
            gid,
            hard,
        } = &records[0]
        else {
            panic!("expected a relabel record first");
        };
        assert_eq!((*nobs, *gid), (6, 10));
        assert_eq!(hard, &[0, 0, 0, 1, 1, 1]);
        assert!(labels.iter().all(|&z| (0..2).contains(&z)));

        assert!(matches!(records[1], Record::Statistics { gid: 20, .. }));

        let Record::Labels { nobs, labels, gid } = &records[2] else {
            panic!("expected a labels record last");
        };
        assert_eq!((*nobs, *gid), (6, 30));
        assert_eq!(labels.len(), 6);
        assert!(labels.iter().all(|&z| (0..3).contains(&z)));

        send_header(&mut tx_c, TaskHeader::Kill).await?;
        Ok::<_, io::Error>(())
    };

    let (worker_ret, coordinator_ret) = tokio::join!(worker.run(rx_w, tx_w), coordinator);
    worker_ret.unwrap();
    coordinator_ret.unwrap();
}

#[tokio::test]
async fn empty_batch_reports_zero_results() {
    let ((rx_w, tx_w), (mut rx_c, mut tx_c)) = channel_pair();
    let mut worker = Worker::new(test_config(), HostEngine::new());

    let coordinator = async move {
        send_batch(&mut tx_c, &[]).await?;
        assert!(recv_results(&mut rx_c, &[]).await?.is_empty());

        send_header(&mut tx_c, TaskHeader::Kill).await?;
        Ok::<_, io::Error>(())
    };

    let (worker_ret, coordinator_ret) = tokio::join!(worker.run(rx_w, tx_w), coordinator);
    worker_ret.unwrap();
    coordinator_ret.unwrap();
}

#[tokio::test]
async fn registration_reseeds_the_sampler() {
    let ((rx_w, tx_w), (mut rx_c, mut tx_c)) = channel_pair();
    let mut worker = Worker::new(test_config(), HostEngine::new());

    // Both components sit on every observation, so each label is a fair coin flip.
    let data = Array2::<f64>::zeros((64, 1));
    let coin = || Request {
        dataset: 0,
        kind: SubTaskKind::Labels,
        gid: 0,
        weights: vec![0.5, 0.5],
        means: vec![0., 0.],
        covs: vec![1., 1.],
    };

    let coordinator = async move {
        let mut draws = Vec::new();
        for seed in [42, 42, 43] {
            register(&mut rx_c, &mut tx_c, &data, seed).await?;
            send_batch(&mut tx_c, &[coin()]).await?;

            let mut records = recv_results(&mut rx_c, &[SubTaskKind::Labels]).await?;
            let Some(Record::Labels { labels, .. }) = records.pop() else {
                panic!("expected a labels record");
            };
            draws.push(labels);
        }

        assert_eq!(draws[0], draws[1]);
        assert_ne!(draws[0], draws[2]);

        send_header(&mut tx_c, TaskHeader::Kill).await?;
        Ok::<_, io::Error>(())
    };

    let (worker_ret, coordinator_ret) = tokio::join!(worker.run(rx_w, tx_w), coordinator);
    worker_ret.unwrap();
    coordinator_ret.unwrap();
}
