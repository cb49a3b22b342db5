//! Backend worker thread
//!
//! The backend call is the only part of the pipeline that runs off the frame
//! loop. A dedicated thread owns the boxed backend and serves commands from
//! a channel; propagation replies stream back on a second channel drained by
//! the pipeline's pump. Commands are processed in order, so a release issued
//! after the in-flight counter reaches zero never overtakes a propagate.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use super::backend::{PropagationBackend, SetHandle};

const RELEASE_ACK_TIMEOUT: Duration = Duration::from_secs(5);

enum Command {
    Propagate {
        set: SetHandle,
        offsets_min: Vec<f64>,
    },
    Release {
        set: SetHandle,
        ack: Sender<Result<()>>,
    },
    Stop,
}

/// One propagation reply, success or failure, with its batch duration.
pub struct PropagateReply {
    pub result: Result<Vec<f32>>,
    pub elapsed: Duration,
}

/// What the pump learned from the reply channel.
pub enum Drained {
    Reply(PropagateReply),
    Empty,
    /// Worker thread is gone; an in-flight call will never resolve.
    Disconnected,
}

pub struct BackendWorker {
    sender: Sender<Command>,
    receiver: Receiver<PropagateReply>,
    handle: Option<thread::JoinHandle<()>>,
}

impl BackendWorker {
    pub fn spawn(mut backend: Box<dyn PropagationBackend>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (reply_tx, reply_rx) = mpsc::channel::<PropagateReply>();

        let handle = thread::spawn(move || {
            while let Ok(command) = cmd_rx.recv() {
                match command {
                    Command::Propagate { set, offsets_min } => {
                        let started = Instant::now();
                        let result = backend.propagate(set, &offsets_min);
                        let reply = PropagateReply {
                            result,
                            elapsed: started.elapsed(),
                        };
                        if reply_tx.send(reply).is_err() {
                            break;
                        }
                    }
                    Command::Release { set, ack } => {
                        let _ = ack.send(backend.release_set(set));
                    }
                    Command::Stop => break,
                }
            }
            log::debug!("Backend worker stopped");
        });

        Self {
            sender: cmd_tx,
            receiver: reply_rx,
            handle: Some(handle),
        }
    }

    /// Dispatch one propagation call. Fails only if the worker is gone.
    pub fn dispatch(&self, set: SetHandle, offsets_min: Vec<f64>) -> Result<()> {
        self.sender
            .send(Command::Propagate { set, offsets_min })
            .map_err(|_| anyhow!("Backend worker is gone"))
    }

    /// Non-blocking drain of the reply channel.
    pub fn drain(&self) -> Drained {
        match self.receiver.try_recv() {
            Ok(reply) => Drained::Reply(reply),
            Err(TryRecvError::Empty) => Drained::Empty,
            Err(TryRecvError::Disconnected) => Drained::Disconnected,
        }
    }

    /// Release the set on the worker and wait for its acknowledgement.
    pub fn release(&self, set: SetHandle) -> Result<()> {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.sender
            .send(Command::Release { set, ack: ack_tx })
            .map_err(|_| anyhow!("Backend worker is gone"))?;
        ack_rx
            .recv_timeout(RELEASE_ACK_TIMEOUT)
            .map_err(|_| anyhow!("No release acknowledgement from worker"))?
    }

    /// Stop the worker thread and wait for it. Idempotent.
    pub fn stop(&mut self) {
        let _ = self.sender.send(Command::Stop);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Backend worker panicked during shutdown");
            }
        }
    }
}

impl Drop for BackendWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
