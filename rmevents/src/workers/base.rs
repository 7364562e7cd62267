use std::any::Any;
use std::fmt;
use std::thread::{self, JoinHandle};

use crate::error::{ErrorKind, StreamResult};
use crate::stream_error;

/// Classification of the threads of a streaming system.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WorkerType {
    /// The single thread polling every watched table and building fragments.
    Listener,
    /// A thread joining the fragments of its share of correlation ids.
    Handler { id: u16 },
}

impl WorkerType {
    pub fn thread_name(&self) -> String {
        match self {
            WorkerType::Listener => "listener".to_owned(),
            WorkerType::Handler { id } => format!("handler-{id}"),
        }
    }

    fn panic_kind(&self) -> ErrorKind {
        match self {
            WorkerType::Listener => ErrorKind::ListenerThreadPanic,
            WorkerType::Handler { .. } => ErrorKind::HandlerThreadPanic,
        }
    }
}

impl fmt::Display for WorkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerType::Listener => write!(f, "listener"),
            WorkerType::Handler { id } => write!(f, "handler {id}"),
        }
    }
}

/// A worker that runs on a dedicated OS thread once started.
pub trait Worker {
    type Handle: WorkerHandle;

    /// Spawns the worker thread and returns immediately.
    fn start(self) -> StreamResult<Self::Handle>;
}

/// Handle to a running worker.
pub trait WorkerHandle {
    /// Value the worker hands back when its loop exits cleanly.
    type Output;

    /// Blocks until the worker thread exits. A panic is turned into an error.
    fn wait(self) -> StreamResult<Self::Output>;
}

/// Join handle of a worker thread, shared by every worker type.
#[derive(Debug)]
pub struct ThreadHandle<T> {
    worker_type: WorkerType,
    handle: JoinHandle<StreamResult<T>>,
}

impl<T> ThreadHandle<T>
where
    T: Send + 'static,
{
    pub(crate) fn spawn<F>(worker_type: WorkerType, body: F) -> StreamResult<Self>
    where
        F: FnOnce() -> StreamResult<T> + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(worker_type.thread_name())
            .spawn(body)
            .map_err(|err| {
                stream_error!(
                    ErrorKind::ThreadSpawnFailed,
                    "Failed to spawn worker thread",
                    worker_type,
                    source: err
                )
            })?;

        Ok(Self {
            worker_type,
            handle,
        })
    }

    pub fn worker_type(&self) -> WorkerType {
        self.worker_type
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> WorkerHandle for ThreadHandle<T> {
    type Output = T;

    fn wait(self) -> StreamResult<T> {
        let worker_type = self.worker_type;
        self.handle.join().map_err(|panic| {
            stream_error!(
                worker_type.panic_kind(),
                "Worker thread panicked",
                format!("{worker_type} panicked: {}", panic_message(&*panic))
            )
        })?
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_the_worker_result() {
        let handle = ThreadHandle::spawn(WorkerType::Handler { id: 3 }, || Ok(7)).unwrap();
        assert_eq!(handle.worker_type(), WorkerType::Handler { id: 3 });
        assert_eq!(handle.wait().unwrap(), 7);
    }

    #[test]
    fn panics_become_errors() {
        let handle =
            ThreadHandle::<()>::spawn(WorkerType::Listener, || panic!("source exploded"))
                .unwrap();

        let err = handle.wait().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ListenerThreadPanic);
        assert!(err.detail().unwrap().contains("source exploded"));
    }

    #[test]
    fn thread_names_identify_the_worker() {
        assert_eq!(WorkerType::Listener.thread_name(), "listener");
        assert_eq!(WorkerType::Handler { id: 2 }.thread_name(), "handler-2");
    }
}
