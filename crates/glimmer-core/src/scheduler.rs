//! The tick scheduler
//!
//! Arbitrates visualizers per output by priority, cascades activation down
//! to the inputs the winners want, and drives one tick: update inputs,
//! paint, drain outputs. The loop runs unthrottled on a dedicated thread -
//! a deliberate low-latency choice. Active/Enabled are recomputed from
//! scratch every tick with no hysteresis.
//!
//! Nothing inside a tick is caught: any failure terminates the tick thread
//! and thereby stops all hardware output at once. Recovery is external.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::info;

use crate::{Input, Output, Result, Visualizer};

fn identity<T: ?Sized>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc) as *const () as usize
}

/// Owns the tick thread and the full sets of outputs and inputs it
/// arbitrates over.
pub struct Scheduler {
    outputs: Vec<Arc<dyn Output>>,
    inputs: Vec<Arc<dyn Input>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(outputs: Vec<Arc<dyn Output>>, inputs: Vec<Arc<dyn Input>>) -> Self {
        Self {
            outputs,
            inputs,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Start the dedicated tick thread. Starting twice is a no-op.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        self.stop.store(false, Ordering::Relaxed);
        let outputs = self.outputs.clone();
        let inputs = self.inputs.clone();
        let stop = self.stop.clone();
        let worker = std::thread::Builder::new()
            .name("glimmer-scheduler".into())
            .spawn(move || {
                info!("scheduler thread running");
                while !stop.load(Ordering::Relaxed) {
                    if let Err(e) = tick(&outputs, &inputs) {
                        panic!("scheduler tick failed: {e}");
                    }
                }
            })?;
        self.worker = Some(worker);
        Ok(())
    }

    /// Stop the tick thread, then deactivate every input and output to
    /// release hardware. The in-flight tick is allowed to finish. A panic
    /// that killed the tick thread resurfaces here after cleanup.
    pub fn stop(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        self.stop.store(true, Ordering::Relaxed);
        let outcome = worker.join();
        for input in &self.inputs {
            input.set_active(false)?;
        }
        for output in &self.outputs {
            output.set_active(false)?;
        }
        info!("scheduler stopped");
        if let Err(panic) = outcome {
            std::panic::resume_unwind(panic);
        }
        Ok(())
    }

    /// Whether the tick thread is running.
    pub fn running(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Best-effort shutdown; unlike stop() this never re-raises a tick
        // panic, because drop may already be running during unwind.
        if let Some(worker) = self.worker.take() {
            self.stop.store(true, Ordering::Relaxed);
            let _ = worker.join();
            for input in &self.inputs {
                let _ = input.set_active(false);
            }
            for output in &self.outputs {
                let _ = output.set_active(false);
            }
        }
    }
}

/// One full scheduler iteration over `outputs` and `inputs`.
pub fn tick(outputs: &[Arc<dyn Output>], inputs: &[Arc<dyn Input>]) -> Result<()> {
    let mut known: HashMap<usize, Arc<dyn Visualizer>> = HashMap::new();
    let mut winners: HashMap<usize, Arc<dyn Visualizer>> = HashMap::new();
    let mut outputs_to_drain: Vec<&Arc<dyn Output>> = Vec::new();

    // Arbitration: per output, the highest registered priority wins and
    // ties share; an output with no winner releases its hardware.
    for output in outputs {
        if !output.enabled() {
            output.set_active(false)?;
            continue;
        }
        let registered = output.visualizers();
        for vis in &registered {
            known.entry(identity(vis)).or_insert_with(|| vis.clone());
        }
        let top = registered.iter().map(|v| v.priority()).max();
        let winning: Vec<Arc<dyn Visualizer>> = match top {
            Some(top) => registered
                .iter()
                .filter(|v| v.priority() == top)
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        output.set_active(!winning.is_empty())?;
        if !winning.is_empty() {
            outputs_to_drain.push(output);
            for vis in winning {
                winners.entry(identity(&vis)).or_insert(vis);
            }
        }
    }

    // Winning visualizers are enabled, everything else disabled.
    for (id, vis) in &known {
        vis.set_enabled(winners.contains_key(id));
    }

    // Cascade: exactly the inputs the winners request are active.
    let wanted: HashSet<usize> = winners
        .values()
        .flat_map(|v| v.inputs())
        .map(|i| identity(&i))
        .collect();
    for input in inputs {
        input.set_active(wanted.contains(&identity(input)))?;
    }

    for input in inputs {
        if input.active() {
            input.operator_update()?;
        }
    }

    for vis in winners.values() {
        if vis.enabled() {
            vis.visualize()?;
        }
    }

    // Cooperative drain for every output that had a winner.
    for output in outputs_to_drain {
        output.operator_update()?;
    }

    Ok(())
}
