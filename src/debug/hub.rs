use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use futures::future::BoxFuture;
use tokio::runtime::Runtime;
use tracing::{debug, trace, warn};

use crate::{
    ShareLock,
    common::{read, write},
    debug::{DebugData, DebugLog},
    events::TraceEvent,
};

pub type DebugHandle = Arc<dyn Fn(&TraceEvent) + Send + Sync>;
pub type DebugHandleAsync = Arc<dyn Fn(&TraceEvent) -> BoxFuture<'static, ()> + Send + Sync>;

struct Observer {
    chain_id: String,
    sender: flume::Sender<TraceEvent>,
}

/// Fans trace events out to debug observers and records them in the [`DebugLog`].
///
/// Each observer owns a bounded queue drained by one task, so a slow observer
/// only delays itself. When its queue is full the event is dropped for that
/// observer alone.
pub struct DebugHub {
    observers: ShareLock<HashMap<String, Observer>>,
    log: DebugLog,
    queue_size: usize,
    log_traces: bool,
    runtime: Arc<Runtime>,
}

impl DebugHub {
    pub fn new(
        log: DebugLog,
        queue_size: usize,
        log_traces: bool,
        runtime: Arc<Runtime>,
    ) -> Self {
        Self {
            observers: Arc::new(RwLock::new(HashMap::new())),
            log,
            queue_size: queue_size.max(1),
            log_traces,
            runtime,
        }
    }

    /// Records `event` and hands it to every observer of its chain.
    ///
    /// Never blocks on an observer.
    pub fn on_trace(
        &self,
        event: TraceEvent,
    ) {
        if self.log_traces {
            debug!(
                chain_id = %event.chain_id,
                flow = event.flow.as_ref(),
                node_id = %event.node_id,
                data = %event.msg.data,
                err = ?event.err,
                "rule chain trace"
            );
        }
        self.log.add(&event.chain_id, DebugData::from(&event));

        let targets: Vec<(String, flume::Sender<TraceEvent>)> = read(&self.observers)
            .iter()
            .filter(|(_, o)| o.chain_id == event.chain_id)
            .map(|(id, o)| (id.clone(), o.sender.clone()))
            .collect();

        for (observer_id, sender) in targets {
            match sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(flume::TrySendError::Full(_)) => {
                    warn!("debug observer {} is lagging, dropped trace of node {}", observer_id, event.node_id);
                }
                Err(flume::TrySendError::Disconnected(_)) => {}
            }
        }
    }

    /// Registers a synchronous observer of `chain_id`, replacing any observer with the same id.
    ///
    /// The callback runs on the blocking pool, one event at a time.
    pub fn add_observer(
        &self,
        chain_id: &str,
        observer_id: &str,
        f: impl Fn(&TraceEvent) + Send + Sync + 'static,
    ) {
        let handle: DebugHandle = Arc::new(f);
        let receiver = self.register(chain_id, observer_id);
        let observer_id = observer_id.to_string();

        self.runtime.spawn(async move {
            while let Ok(event) = receiver.recv_async().await {
                let handle = handle.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || handle(&event)).await {
                    warn!("debug observer {} failed: {}", observer_id, e);
                }
            }
        });
    }

    /// Registers an asynchronous observer of `chain_id`.
    pub fn add_observer_async<F>(
        &self,
        chain_id: &str,
        observer_id: &str,
        f: F,
    ) where
        F: Fn(&TraceEvent) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let handle: DebugHandleAsync = Arc::new(f);
        let receiver = self.register(chain_id, observer_id);

        self.runtime.spawn(async move {
            while let Ok(event) = receiver.recv_async().await {
                (handle)(&event).await;
            }
        });
    }

    /// Removes an observer. Its task ends once the queued events are delivered.
    pub fn remove_observer(
        &self,
        observer_id: &str,
    ) -> bool {
        trace!("debug::remove_observer({})", observer_id);
        write(&self.observers).remove(observer_id).is_some()
    }

    pub fn observer_count(&self) -> usize {
        read(&self.observers).len()
    }

    pub fn log(&self) -> &DebugLog {
        &self.log
    }

    fn register(
        &self,
        chain_id: &str,
        observer_id: &str,
    ) -> flume::Receiver<TraceEvent> {
        trace!("debug::add_observer({}, {})", chain_id, observer_id);
        let (sender, receiver) = flume::bounded(self.queue_size);
        write(&self.observers).insert(
            observer_id.to_string(),
            Observer {
                chain_id: chain_id.to_string(),
                sender,
            },
        );
        receiver
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::runtime::Builder;

    use super::*;
    use crate::events::{FlowDirection, RuleMsg};

    const WAIT: Duration = Duration::from_secs(5);

    fn hub(queue_size: usize) -> DebugHub {
        let runtime = Arc::new(Builder::new_multi_thread().worker_threads(2).enable_all().build().unwrap());
        DebugHub::new(DebugLog::new(40, 64), queue_size, false, runtime)
    }

    fn event(
        chain_id: &str,
        i: usize,
    ) -> TraceEvent {
        TraceEvent::new(chain_id, "n1", FlowDirection::Out, RuleMsg::new("TEST", i.to_string()), "Success", None)
    }

    #[test]
    fn test_observer_receives_only_its_chain() {
        let hub = hub(64);
        let (tx, rx) = flume::unbounded();
        hub.add_observer("x", "client-1", move |e| {
            let _ = tx.send(e.clone());
        });

        for i in 0..20 {
            hub.on_trace(event("x", i));
            hub.on_trace(event("y", i));
        }

        for i in 0..20 {
            let e = rx.recv_timeout(WAIT).unwrap();
            assert_eq!(e.chain_id, "x");
            assert_eq!(e.msg.data, i.to_string());
        }
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert_eq!(hub.log().get("y", None).len(), 20);
    }

    #[test]
    fn test_blocked_observer_does_not_delay_others() {
        let hub = hub(64);
        let (release_tx, release_rx) = flume::bounded::<()>(1);
        let (slow_tx, slow_rx) = flume::unbounded();
        hub.add_observer("x", "slow", move |e| {
            let _ = release_rx.recv();
            let _ = slow_tx.send(e.msg.data.clone());
        });
        let (fast_tx, fast_rx) = flume::unbounded();
        hub.add_observer("x", "fast", move |e| {
            let _ = fast_tx.send(e.msg.data.clone());
        });

        for i in 0..3 {
            hub.on_trace(event("x", i));
        }
        for i in 0..3 {
            assert_eq!(fast_rx.recv_timeout(WAIT).unwrap(), i.to_string());
        }
        assert!(slow_rx.try_recv().is_err());

        drop(release_tx);
        for i in 0..3 {
            assert_eq!(slow_rx.recv_timeout(WAIT).unwrap(), i.to_string());
        }
    }

    #[test]
    fn test_full_queue_drops_for_that_observer_only() {
        let hub = hub(1);
        let (release_tx, release_rx) = flume::bounded::<()>(1);
        let (slow_tx, slow_rx) = flume::unbounded();
        hub.add_observer("x", "slow", move |e| {
            let _ = release_rx.recv();
            let _ = slow_tx.send(e.msg.data.clone());
        });

        for i in 0..10 {
            hub.on_trace(event("x", i));
        }
        drop(release_tx);

        let mut delivered = 0;
        while slow_rx.recv_timeout(Duration::from_millis(500)).is_ok() {
            delivered += 1;
        }
        assert!(delivered >= 1 && delivered < 10);
        assert_eq!(hub.log().get("x", None).len(), 10);
    }

    #[test]
    fn test_async_observer_and_removal() {
        let hub = hub(64);
        let (tx, rx) = flume::unbounded();
        hub.add_observer_async("x", "client-1", move |e| {
            let tx = tx.clone();
            let data = e.msg.data.clone();
            Box::pin(async move {
                let _ = tx.send_async(data).await;
            })
        });
        assert_eq!(hub.observer_count(), 1);

        hub.on_trace(event("x", 1));
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "1");

        assert!(hub.remove_observer("client-1"));
        assert!(!hub.remove_observer("client-1"));
        hub.on_trace(event("x", 2));
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }
}
