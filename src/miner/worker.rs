//! C7: the proof-of-work worker. Runs on its own OS thread and never
//! touches shared ledger/chain state — it only receives a block to search
//! over and emits progress/result messages back to the orchestrator.

use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use crate::blockchain::block::hash_meets_difficulty;
use crate::blockchain::Block;

const UPDATE_CADENCE: u64 = 1_000_000;

#[derive(Debug)]
pub enum WorkerRequest {
    Mine {
        block: Block,
        difficulty: u32,
        start_nonce: u64,
        nonce_end: u64,
    },
    Abort,
}

#[derive(Debug)]
pub enum WorkerResponse {
    Update { nonce: u64, elapsed_secs: f64 },
    Solved { block: Block, elapsed_secs: f64 },
    Aborted,
}

pub struct WorkerHandle {
    pub requests: mpsc::Sender<WorkerRequest>,
    pub responses: mpsc::Receiver<WorkerResponse>,
    thread: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn abort(&self) {
        let _ = self.requests.send(WorkerRequest::Abort);
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.abort();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Spawns the worker thread and returns a handle for sending `Mine`/`Abort`
/// requests and receiving `Update`/`Solved`/`Aborted` responses.
pub fn spawn_worker() -> WorkerHandle {
    let (req_tx, req_rx) = mpsc::channel::<WorkerRequest>();
    let (resp_tx, resp_rx) = mpsc::channel::<WorkerResponse>();

    let thread = thread::spawn(move || worker_loop(req_rx, resp_tx));

    WorkerHandle {
        requests: req_tx,
        responses: resp_rx,
        thread: Some(thread),
    }
}

fn worker_loop(requests: mpsc::Receiver<WorkerRequest>, responses: mpsc::Sender<WorkerResponse>) {
    while let Ok(request) = requests.recv() {
        match request {
            WorkerRequest::Abort => continue,
            WorkerRequest::Mine {
                mut block,
                difficulty,
                start_nonce,
                nonce_end,
            } => {
                let started = Instant::now();
                let mut nonce = start_nonce;
                let mut aborted = false;

                loop {
                    block.nonce = nonce;
                    let hash = block.calc_hash();
                    if hash_meets_difficulty(&hash, difficulty) {
                        block.hash = hash;
                        block.pow_time = Some(started.elapsed().as_secs_f64());
                        let _ = responses.send(WorkerResponse::Solved {
                            block,
                            elapsed_secs: started.elapsed().as_secs_f64(),
                        });
                        break;
                    }

                    if nonce >= nonce_end {
                        aborted = true;
                        break;
                    }

                    if nonce % UPDATE_CADENCE == 0 {
                        if let Ok(WorkerRequest::Abort) = requests.try_recv() {
                            aborted = true;
                            break;
                        }
                        let _ = responses.send(WorkerResponse::Update {
                            nonce,
                            elapsed_secs: started.elapsed().as_secs_f64(),
                        });
                    }

                    nonce += 1;
                }

                if aborted {
                    let _ = responses.send(WorkerResponse::Aborted);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Transaction, TxType, PROTOCOL_VERSION};

    fn sample_block() -> Block {
        let tx = Transaction {
            timestamp: 0,
            src: "_mint".into(),
            dest: "alice".into(),
            amount: 1.0,
            token: crate::crypto::BASE_TOKEN.into(),
            fee: 0.0,
            tx_type: TxType::MintIssue,
            seq: 0,
            tx_sig: None,
            hash: "h1".into(),
            source: None,
            note: None,
            meta: None,
        };
        Block::new(1, "prev".into(), PROTOCOL_VERSION, 0, "node0".into(), vec![tx]).unwrap()
    }

    #[test]
    fn worker_solves_a_low_difficulty_block() {
        let handle = spawn_worker();
        handle
            .requests
            .send(WorkerRequest::Mine {
                block: sample_block(),
                difficulty: 1,
                start_nonce: 0,
                nonce_end: 10_000_000,
            })
            .unwrap();

        loop {
            match handle.responses.recv().unwrap() {
                WorkerResponse::Solved { block, .. } => {
                    assert!(hash_meets_difficulty(&block.hash, 1));
                    break;
                }
                WorkerResponse::Update { .. } => continue,
                WorkerResponse::Aborted => panic!("should have solved well within the nonce budget"),
            }
        }
    }
}
