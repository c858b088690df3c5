use std::sync::Arc;

use iced::executor;
use tokio::runtime::{Builder, Runtime};

/// Runs the GUI's commands on a multi-threaded tokio runtime so the tracker
/// can spawn its poll loop from inside `update`.
#[derive(Debug)]
pub struct TokioExecutor {
    runtime: Arc<Runtime>,
}

impl executor::Executor for TokioExecutor {
    fn new() -> Result<Self, std::io::Error> {
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .thread_name("wallet-tracker-worker")
            .build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }

    fn spawn(&self, future: impl std::future::Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(future);
    }

    fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.runtime.enter();
        f()
    }
}
