use crossbeam::channel::{Receiver, Sender};
use slog::{debug, error, warn, Logger};
use std::sync::Arc;

use super::{
    pool::{Shared, Worker},
    Message,
};
/// It supervises workers: replaces the ones killed by a panicking job and
/// joins all of them on termination.
pub(super) struct Supervisor {
    workers: Vec<Worker>,
    receiver: Receiver<Message>,
    sender: Sender<Message>,
    shared: Arc<Shared>,
    name: String,
    logger: Logger,
}

impl Supervisor {
    pub(super) fn new(
        receiver: Receiver<Message>,
        sender: Sender<Message>,
        workers: Vec<Worker>,
        shared: Arc<Shared>,
        name: String,
        logger: Logger,
    ) -> Self {
        Supervisor {
            workers,
            receiver,
            sender,
            shared,
            name,
            logger,
        }
    }
    // listen to channel
    pub(super) fn watch(&mut self) {
        while let Ok(message) = self.receiver.recv() {
            match message {
                Message::Dead(id) => self.revive(id),
                Message::Terminate => break,
            }
        }
        self.join_all();
    }

    // spawn a new worker in place of a dead one
    fn revive(&mut self, id: usize) {
        let slot = match self.workers.iter().position(|worker| worker.id() == id) {
            Some(slot) => slot,
            None => {
                error!(self.logger, "unknown worker reported dead"; "worker" => id);
                return;
            }
        };
        self.workers[slot].join();

        if self.shared.is_terminating() {
            return;
        }
        match Worker::spawn(
            id,
            &self.name,
            Arc::clone(&self.shared),
            self.sender.clone(),
            &self.logger,
        ) {
            Ok(worker) => {
                warn!(self.logger, "replaced dead worker"; "worker" => id);
                self.workers[slot] = worker;
            }
            Err(err) => {
                error!(self.logger, "unable to replace dead worker";
                    "worker" => id,
                    "error" => %err
                );
            }
        }
    }

    fn join_all(&mut self) {
        for worker in self.workers.iter_mut() {
            if !worker.join() {
                debug!(self.logger, "worker ended by a panic"; "worker" => worker.id());
            }
        }
    }
}
