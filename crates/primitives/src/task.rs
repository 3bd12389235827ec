use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::FutureExt;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::debug;

/// A set of named long-running tasks, such as L1 subscriptions and event loops.
///
/// These tasks are expected to run for the whole lifetime of the node. Awaiting the set
/// resolves as soon as any of them exits, so that the caller can treat it as a failure. The
/// exited task is removed from the set, and the others can still be joined with
/// [`CriticalTasks::join_all`].
#[derive(Debug, Default)]
pub struct CriticalTasks {
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl CriticalTasks {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the task and adds it to the set.
    pub fn add_task<F>(&mut self, task: F, name: &str)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.add_handle(tokio::spawn(task), name);
    }

    /// Spawns the task so that it stops as soon as the token is cancelled, and adds it to
    /// the set.
    pub fn add_cancellable_task<F>(&mut self, task: F, name: &str, token: CancellationToken)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task_name = name.to_owned();
        self.add_task(
            async move {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => debug!(task = %task_name, "Task cancelled"),
                    _ = task => {}
                }
            },
            name,
        );
    }

    /// Adds an already spawned task to the set.
    pub fn add_handle(&mut self, handle: JoinHandle<()>, name: &str) {
        self.tasks.push((name.to_owned(), handle));
    }

    /// Waits for every remaining task to exit, and returns their outcomes in insertion order.
    ///
    /// Used on shutdown, once the tasks have been told to stop.
    pub async fn join_all(self) -> Vec<TaskResult> {
        let (names, handles): (Vec<_>, Vec<_>) = self.tasks.into_iter().unzip();
        futures::future::join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .map(|(res, name)| TaskResult::new(name, res.err()))
            .collect()
    }

    /// Returns the number of tasks in the set.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if the set contains no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// The outcome of a task of the [`CriticalTasks`] set that exited.
#[derive(Debug)]
pub struct TaskResult {
    name: String,
    err: Option<JoinError>,
}

impl TaskResult {
    /// Creates a new instance of `TaskResult`.
    pub const fn new(name: String, err: Option<JoinError>) -> Self {
        Self { name, err }
    }

    /// Returns the name of the task.
    #[allow(clippy::missing_const_for_fn)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the panic message, or an empty string if the task returned normally.
    pub fn error_message(self) -> String {
        let Some(err) = self.err else {
            return String::new();
        };

        if !err.is_panic() {
            return "Task was cancelled".to_owned()
        }

        let panic_value = err.into_panic();
        if let Some(s) = panic_value.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = panic_value.downcast_ref::<String>() {
            s.clone()
        } else {
            "Task panicked with unknown type".to_owned()
        }
    }
}

impl Future for CriticalTasks {
    type Output = Option<TaskResult>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.tasks.is_empty() {
            return Poll::Ready(None);
        }

        for i in 0..this.tasks.len() {
            if let Poll::Ready(res) = this.tasks[i].1.poll_unpin(cx) {
                let (name, _) = this.tasks.swap_remove(i);
                return Poll::Ready(Some(TaskResult::new(name, res.err())));
            }
        }

        Poll::Pending
    }
}

/// A join gate for short-lived background work, such as retried proof submissions.
///
/// Every task receives a child of the gate's token. Closing the gate cancels the token and
/// waits for all in-flight tasks to observe it.
#[derive(Debug, Clone)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
    token: CancellationToken,
}

impl BackgroundTasks {
    /// Creates a new gate bound to the given cancellation token.
    pub fn new(token: CancellationToken) -> Self {
        Self { tracker: TaskTracker::new(), token }
    }

    /// Returns the token tasks should observe.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Spawns a task, built from a child token of the gate.
    pub fn spawn<F, Fut>(&self, f: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(f(self.token()));
    }

    /// Returns the number of tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Cancels every task and waits until all of them have returned.
    pub async fn close(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use super::*;

    async fn panic_with_value<T: Send + 'static>(value: T) -> JoinError {
        let handle = tokio::spawn(async move { std::panic::panic_any(value) });
        handle.await.expect_err("task should panic")
    }

    #[tokio::test]
    async fn error_message_from_panics() {
        let err = panic_with_value("boom").await;
        assert_eq!(TaskResult::new("t".to_owned(), Some(err)).error_message(), "boom");

        let err = panic_with_value("boom".to_owned()).await;
        assert_eq!(TaskResult::new("t".to_owned(), Some(err)).error_message(), "boom");

        let err = panic_with_value(42u32).await;
        assert_eq!(
            TaskResult::new("t".to_owned(), Some(err)).error_message(),
            "Task panicked with unknown type"
        );
    }

    #[tokio::test]
    async fn critical_tasks_resolve_on_first_exit() {
        let mut tasks = CriticalTasks::new();
        tasks.add_task(std::future::pending(), "forever");
        tasks.add_task(async {}, "short");

        let res = tasks.await.expect("a task exited");
        assert_eq!(res.name(), "short");
        assert_eq!(res.error_message(), "");
    }

    #[tokio::test]
    async fn join_all_waits_for_slow_tasks() {
        let token = CancellationToken::new();
        let drained = Arc::new(AtomicUsize::new(0));
        let mut tasks = CriticalTasks::new();

        let fast = token.clone();
        tasks.add_task(async move { fast.cancelled().await }, "fast");
        let (slow, slow_drained) = (token.clone(), Arc::clone(&drained));
        tasks.add_task(
            async move {
                slow.cancelled().await;
                tokio::time::sleep(Duration::from_millis(50)).await;
                slow_drained.fetch_add(1, Ordering::SeqCst);
            },
            "slow",
        );

        token.cancel();
        let first = (&mut tasks).await.expect("a task exited");
        assert_eq!(first.name(), "fast");
        assert_eq!(tasks.len(), 1);

        let rest = tasks.join_all().await;
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].name(), "slow");
        assert_eq!(drained.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellable_task_stops_on_token() {
        let token = CancellationToken::new();
        let mut tasks = CriticalTasks::new();
        tasks.add_cancellable_task(std::future::pending(), "sub", token.clone());

        token.cancel();
        let res = tasks.await.expect("task exited");
        assert_eq!(res.name(), "sub");
    }

    #[tokio::test]
    async fn background_tasks_are_joined_on_close() {
        let gate = BackgroundTasks::new(CancellationToken::new());
        let finished = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let finished = Arc::clone(&finished);
            gate.spawn(|token| async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(Duration::from_secs(3_600)) => {}
                }
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(gate.in_flight(), 3);

        gate.close().await;
        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert_eq!(gate.in_flight(), 0);
    }
}
