//! Bounded-queue wiring for the continuous-mode deployment: a producer
//! thread pushes batches onto a bounded FIFO, the consumer thread owns the
//! `Pipeline` and drains it via `run_loop`, and a second bounded FIFO carries
//! `ObjectRecord` output to downstream streaming sinks. If that output FIFO
//! is full, the current tick's records are dropped rather than blocking the
//! consumer.

use std::time::Duration;

use aloft_types::{ObjectRecord, RawSensorRecord};
use crossbeam_channel::{Receiver, Sender};
use sensor_io::{Batcher, Exporter, SensorIoError};
use tracing::warn;

use crate::OverflowPolicy;

/// Producer-side handle for pushing batches onto the bounded input FIFO.
#[derive(Clone)]
pub struct BatchProducer {
    sender: Sender<Vec<RawSensorRecord>>,
    policy: OverflowPolicy,
}

impl BatchProducer {
    pub fn push(&self, batch: Vec<RawSensorRecord>) {
        match self.policy {
            OverflowPolicy::Block => {
                let _ = self.sender.send(batch);
            }
            OverflowPolicy::DropNewest => {
                if self.sender.try_send(batch).is_err() {
                    warn!("input queue full, dropping newest batch");
                }
            }
        }
    }
}

/// Consumer-side `Batcher`: pops one queued batch per call, never blocking
/// past `poll_interval` so `run_loop` can re-check the cancellation flag on a
/// tick boundary even when the producer is idle.
struct ChannelBatcher {
    receiver: Receiver<Vec<RawSensorRecord>>,
    poll_interval: Duration,
}

impl Batcher for ChannelBatcher {
    fn batch(&mut self) -> Result<Vec<RawSensorRecord>, SensorIoError> {
        match self.receiver.recv_timeout(self.poll_interval) {
            Ok(batch) => Ok(batch),
            Err(_) => Ok(Vec::new()),
        }
    }
}

/// `Exporter` for the downstream streaming-sink FIFO.
struct ChannelExporter {
    sender: Sender<Vec<ObjectRecord>>,
}

impl Exporter for ChannelExporter {
    fn export(&mut self, records: &[ObjectRecord]) -> Result<(), SensorIoError> {
        if !records.is_empty() && self.sender.try_send(records.to_vec()).is_err() {
            warn!("output queue full, dropping this tick's records");
        }
        Ok(())
    }
}

/// Build the bounded input/output queues and the `Batcher`/`Exporter`
/// adapters that let a `Pipeline` be driven from a separate producer thread.
/// Returns the producer handle, the adapters to hand to `Pipeline::new`, and
/// the receiving end of the output FIFO for a downstream consumer.
pub fn channel_adapters(
    input_capacity: usize,
    output_capacity: usize,
    policy: OverflowPolicy,
) -> (
    BatchProducer,
    Box<dyn Batcher + Send>,
    Box<dyn Exporter + Send>,
    Receiver<Vec<ObjectRecord>>,
) {
    let (in_tx, in_rx) = crossbeam_channel::bounded(input_capacity);
    let (out_tx, out_rx) = crossbeam_channel::bounded(output_capacity);

    let producer = BatchProducer {
        sender: in_tx,
        policy,
    };
    let batcher: Box<dyn Batcher + Send> = Box::new(ChannelBatcher {
        receiver: in_rx,
        poll_interval: Duration::from_millis(200),
    });
    let exporter: Box<dyn Exporter + Send> = Box::new(ChannelExporter { sender: out_tx });

    (producer, batcher, exporter, out_rx)
}
