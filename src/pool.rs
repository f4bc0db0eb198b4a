//! Bounded worker pool for per-folder and per-camera fan-out.
//!
//! Tasks go through an explicit queue to a fixed number of threads. Each task
//! runs under `catch_unwind`, so a panicking task is reported like a failed
//! one and its worker keeps serving the queue.

use std::panic::{self, AssertUnwindSafe};

use anyhow::Result;
use crossbeam_channel::{bounded, unbounded};

pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug)]
pub enum TaskFailure {
    Error(anyhow::Error),
    Panicked(String),
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(err) => write!(f, "{:#}", err),
            Self::Panicked(msg) => write!(f, "panicked: {}", msg),
        }
    }
}

#[derive(Debug)]
pub struct TaskReport<R> {
    pub label: String,
    pub result: Result<R, TaskFailure>,
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `work` over every task and collect the reports, in completion order.
    pub fn run<T, R, L, F>(&self, tasks: Vec<T>, label: L, work: F) -> Vec<TaskReport<R>>
    where
        T: Send,
        R: Send,
        L: Fn(&T) -> String + Sync,
        F: Fn(T) -> Result<R> + Sync,
    {
        let mut reports = Vec::with_capacity(tasks.len());
        self.run_with(tasks, label, work, |report| reports.push(report));
        reports
    }

    /// Like [`WorkerPool::run`], handing each report to `on_done` on the
    /// calling thread as soon as it arrives.
    pub fn run_with<T, R, L, F, D>(&self, tasks: Vec<T>, label: L, work: F, mut on_done: D)
    where
        T: Send,
        R: Send,
        L: Fn(&T) -> String + Sync,
        F: Fn(T) -> Result<R> + Sync,
        D: FnMut(TaskReport<R>),
    {
        if tasks.is_empty() {
            return;
        }
        let task_count = tasks.len();
        let (task_tx, task_rx) = bounded::<T>(task_count);
        let (report_tx, report_rx) = unbounded::<TaskReport<R>>();
        for task in tasks {
            // Capacity equals the task count and the receiver is alive.
            let _ = task_tx.send(task);
        }
        drop(task_tx);

        let label = &label;
        let work = &work;
        std::thread::scope(|scope| {
            for _ in 0..self.workers.min(task_count) {
                let task_rx = task_rx.clone();
                let report_tx = report_tx.clone();
                scope.spawn(move || {
                    for task in task_rx.iter() {
                        let name = label(&task);
                        let result = match panic::catch_unwind(AssertUnwindSafe(|| work(task))) {
                            Ok(Ok(value)) => Ok(value),
                            Ok(Err(err)) => Err(TaskFailure::Error(err)),
                            Err(payload) => Err(TaskFailure::Panicked(panic_message(payload))),
                        };
                        if report_tx.send(TaskReport { label: name, result }).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(report_tx);
            for report in report_rx.iter() {
                on_done(report);
            }
        });
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

/// Log every failed report with its label. Returns the number of failures.
pub fn log_failures<R>(what: &str, reports: &[TaskReport<R>]) -> usize {
    let mut failed = 0;
    for report in reports {
        if let Err(failure) = &report.result {
            failed += 1;
            log::error!("{} {} failed: {}", what, report.label, failure);
        }
    }
    failed
}
