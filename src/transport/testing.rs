//! Scripted transport for unit tests.
//!
//! [`ScriptedConnector`] records every socket a monitor opens and lets the
//! test raise events on any of them by index.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::protocol::SocketEvent;

use super::socket::{Connector, EventSink, Socket};

/// Lets spawned tasks run until they block, without moving the clock.
pub(crate) async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

/// What one scripted socket saw.
#[derive(Debug, Default)]
struct SocketLog {
    sent: Vec<String>,
    /// Sends still to reject before accepting again.
    rejects: usize,
    pings: usize,
    closed: bool,
    terminated: bool,
}

/// One `open` call.
struct OpenCall {
    url: String,
    events: EventSink,
    log: Arc<Mutex<SocketLog>>,
}

#[derive(Default)]
struct Script {
    opens: Vec<OpenCall>,
    fail_next: usize,
    reject_next_socket: usize,
}

/// Connector whose sockets never touch the network.
pub(crate) struct ScriptedConnector {
    /// Emit `Opened` as soon as a socket is created.
    auto_open: bool,
    script: Mutex<Script>,
}

impl ScriptedConnector {
    /// Sockets open only when the test emits `Opened`.
    pub(crate) fn manual() -> Arc<Self> {
        Arc::new(Self {
            auto_open: false,
            script: Mutex::new(Script::default()),
        })
    }

    /// Sockets open immediately.
    pub(crate) fn auto_open() -> Arc<Self> {
        Arc::new(Self {
            auto_open: true,
            script: Mutex::new(Script::default()),
        })
    }

    /// Makes the next `count` opens fail synchronously.
    pub(crate) fn fail_next_opens(&self, count: usize) {
        self.script.lock().fail_next = count;
    }

    /// Makes the next socket opened reject its first `count` sends.
    pub(crate) fn reject_sends_on_next_socket(&self, count: usize) {
        self.script.lock().reject_next_socket = count;
    }

    /// Number of `open` calls so far, failed ones included.
    pub(crate) fn open_count(&self) -> usize {
        self.script.lock().opens.len()
    }

    /// URL passed to open call `index`.
    pub(crate) fn url(&self, index: usize) -> String {
        self.script.lock().opens[index].url.clone()
    }

    /// Raises `event` on socket `index`.
    pub(crate) fn emit(&self, index: usize, event: SocketEvent) {
        let events = self.script.lock().opens[index].events.clone();
        events.emit(event);
    }

    /// Raises `event` on the most recent socket.
    pub(crate) fn emit_latest(&self, event: SocketEvent) {
        let index = self.open_count() - 1;
        self.emit(index, event);
    }

    /// Frames sent on socket `index`.
    pub(crate) fn sent(&self, index: usize) -> Vec<String> {
        self.log(index).lock().sent.clone()
    }

    /// Frames sent on every socket, in open order.
    pub(crate) fn all_sent(&self) -> Vec<String> {
        let logs: Vec<_> = self
            .script
            .lock()
            .opens
            .iter()
            .map(|o| Arc::clone(&o.log))
            .collect();
        logs.iter().flat_map(|log| log.lock().sent.clone()).collect()
    }

    /// Liveness probes sent on socket `index`.
    pub(crate) fn pings(&self, index: usize) -> usize {
        self.log(index).lock().pings
    }

    /// Whether socket `index` was closed gracefully.
    pub(crate) fn closed(&self, index: usize) -> bool {
        self.log(index).lock().closed
    }

    /// Whether socket `index` was terminated.
    pub(crate) fn terminated(&self, index: usize) -> bool {
        self.log(index).lock().terminated
    }

    fn log(&self, index: usize) -> Arc<Mutex<SocketLog>> {
        Arc::clone(&self.script.lock().opens[index].log)
    }
}

impl Connector for ScriptedConnector {
    fn open(&self, url: &str, events: EventSink) -> Result<Arc<dyn Socket>> {
        let log = Arc::new(Mutex::new(SocketLog::default()));
        let fail = {
            let mut script = self.script.lock();
            log.lock().rejects = std::mem::take(&mut script.reject_next_socket);
            script.opens.push(OpenCall {
                url: url.to_string(),
                events: events.clone(),
                log: Arc::clone(&log),
            });
            if script.fail_next > 0 {
                script.fail_next -= 1;
                true
            } else {
                false
            }
        };

        if fail {
            return Err(Error::connection("scripted open failure"));
        }

        if self.auto_open {
            events.emit(SocketEvent::Opened);
        }

        Ok(Arc::new(ScriptedSocket { log }))
    }
}

/// Socket that only records what it was asked to do.
struct ScriptedSocket {
    log: Arc<Mutex<SocketLog>>,
}

impl Socket for ScriptedSocket {
    fn send_text(&self, text: String) -> Result<()> {
        let mut log = self.log.lock();
        if log.closed || log.terminated {
            return Err(Error::ConnectionClosed);
        }
        if log.rejects > 0 {
            log.rejects -= 1;
            return Err(Error::connection("scripted send failure"));
        }
        log.sent.push(text);
        Ok(())
    }

    fn ping(&self) -> Result<()> {
        self.log.lock().pings += 1;
        Ok(())
    }

    fn close(&self) {
        self.log.lock().closed = true;
    }

    fn terminate(&self) {
        self.log.lock().terminated = true;
    }
}
