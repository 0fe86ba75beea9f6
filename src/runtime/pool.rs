//! Scoped worker pool with cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{DedupError, Result};
use crate::ui;

/// Shared abort flag, checked between tasks
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}

	pub fn check(&self) -> Result<()> {
		if self.is_cancelled() {
			Err(DedupError::Cancelled)
		} else {
			Ok(())
		}
	}
}

/// Dedicated thread pool. Created once at start, torn down on drop.
pub struct WorkerPool {
	pool: ThreadPool,
	cancel: CancelToken,
}

impl WorkerPool {
	/// Build a pool with `threads` workers, or one per core
	pub fn new(threads: Option<usize>) -> Result<Self> {
		let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("semdedup-worker-{}", i));
		if let Some(n) = threads {
			builder = builder.num_threads(n);
		}
		let pool = builder.build().map_err(|e| DedupError::Io(std::io::Error::other(e)))?;
		ui::debug(&format!("Worker pool started with {} threads", pool.current_num_threads()));
		Ok(Self {
			pool,
			cancel: CancelToken::new(),
		})
	}

	pub fn threads(&self) -> usize {
		self.pool.current_num_threads()
	}

	pub fn cancel_token(&self) -> CancelToken {
		self.cancel.clone()
	}

	/// Run a closure inside the pool so nested rayon work uses its threads
	pub fn install<R, F>(&self, f: F) -> R
	where
		R: Send,
		F: FnOnce() -> R + Send,
	{
		self.pool.install(f)
	}

	/// Run one task per item in parallel, preserving item order.
	/// Tasks not yet started when the token is cancelled fail with `Cancelled`.
	pub fn map<T, R, F>(&self, items: &[T], task: F) -> Result<Vec<R>>
	where
		T: Sync,
		R: Send,
		F: Fn(&T) -> Result<R> + Sync + Send,
	{
		let cancel = &self.cancel;
		self.pool.install(|| {
			items
				.par_iter()
				.map(|item| {
					cancel.check()?;
					task(item)
				})
				.collect()
		})
	}
}

impl Drop for WorkerPool {
	fn drop(&mut self) {
		if self.cancel.is_cancelled() {
			ui::debug("Worker pool shut down after cancellation");
		} else {
			ui::debug("Worker pool shut down");
		}
	}
}
