use std::fmt;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub type ProbeObserver = Arc<dyn Fn(bool) + Send + Sync>;

#[derive(Debug)]
pub enum MonitorError {
    ZeroInterval,
    AlreadyRunning,
    JoinFailed,
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroInterval => write!(f, "heartbeat interval must be greater than zero"),
            Self::AlreadyRunning => write!(f, "heartbeat monitor is already running"),
            Self::JoinFailed => write!(f, "heartbeat probe thread join failed"),
        }
    }
}

impl std::error::Error for MonitorError {}

/// Background liveness probe for one worker endpoint. Each iteration
/// attempts a bare TCP connection bounded by the probe interval and reports
/// the outcome to the observer. Stopping is cooperative: the stop flag is
/// checked between iterations, so an in-flight probe always completes.
pub struct Monitor {
    target: SocketAddr,
    interval: Duration,
    stop_signal: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Monitor {
    pub fn new(target: SocketAddr, interval: Duration) -> Result<Self, MonitorError> {
        if interval.is_zero() {
            return Err(MonitorError::ZeroInterval);
        }

        Ok(Self {
            target,
            interval,
            stop_signal: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn start(&mut self, observer: ProbeObserver) -> Result<(), MonitorError> {
        if self.worker.is_some() {
            return Err(MonitorError::AlreadyRunning);
        }

        self.stop_signal.store(false, Ordering::SeqCst);
        let stop_signal = Arc::clone(&self.stop_signal);
        let target = self.target;
        let interval = self.interval;

        self.worker = Some(thread::spawn(move || {
            loop {
                if stop_signal.load(Ordering::SeqCst) {
                    break;
                }

                let up = TcpStream::connect_timeout(&target, interval).is_ok();
                observer(up);

                if stop_signal.load(Ordering::SeqCst) {
                    break;
                }
                thread::sleep(interval);
            }
        }));

        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), MonitorError> {
        self.stop_signal.store(true, Ordering::SeqCst);

        if let Some(handle) = self.worker.take() {
            return handle.join().map_err(|_| MonitorError::JoinFailed);
        }

        Ok(())
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    use super::{Monitor, MonitorError};

    const PROBE_INTERVAL: Duration = Duration::from_millis(50);

    #[test]
    fn rejects_zero_interval() {
        let addr = "127.0.0.1:9411".parse().expect("addr should parse");
        let result = Monitor::new(addr, Duration::ZERO);
        assert!(matches!(result, Err(MonitorError::ZeroInterval)));
    }

    #[test]
    fn reports_up_while_endpoint_is_listening() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let addr = listener.local_addr().expect("addr should exist");

        let mut monitor = Monitor::new(addr, PROBE_INTERVAL).expect("monitor should build");
        let (tx, rx) = mpsc::channel();
        monitor
            .start(Arc::new(move |up| {
                let _ = tx.send(up);
            }))
            .expect("monitor should start");

        let first = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("first probe result should arrive");
        assert!(first);

        monitor.stop().expect("monitor should stop");
    }

    #[test]
    fn reports_down_when_endpoint_refuses() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let addr = listener.local_addr().expect("addr should exist");
        drop(listener);

        let mut monitor = Monitor::new(addr, PROBE_INTERVAL).expect("monitor should build");
        let (tx, rx) = mpsc::channel();
        monitor
            .start(Arc::new(move |up| {
                let _ = tx.send(up);
            }))
            .expect("monitor should start");

        let first = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("first probe result should arrive");
        assert!(!first);

        monitor.stop().expect("monitor should stop");
    }

    #[test]
    fn start_twice_without_stop_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let addr = listener.local_addr().expect("addr should exist");

        let mut monitor = Monitor::new(addr, PROBE_INTERVAL).expect("monitor should build");
        monitor
            .start(Arc::new(|_| {}))
            .expect("first start should pass");

        let second = monitor.start(Arc::new(|_| {}));
        assert!(matches!(second, Err(MonitorError::AlreadyRunning)));

        monitor.stop().expect("monitor should stop");
    }

    #[test]
    fn stop_joins_the_probe_thread_and_allows_restart() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
        let addr = listener.local_addr().expect("addr should exist");

        let mut monitor = Monitor::new(addr, PROBE_INTERVAL).expect("monitor should build");
        let (tx, rx) = mpsc::channel();
        let observer_tx = tx.clone();
        monitor
            .start(Arc::new(move |up| {
                let _ = observer_tx.send(up);
            }))
            .expect("monitor should start");

        rx.recv_timeout(Duration::from_secs(2))
            .expect("probe result should arrive");
        monitor.stop().expect("monitor should stop");
        assert!(!monitor.is_running());

        // drain anything emitted before the stop flag was observed
        while rx.try_recv().is_ok() {}
        std::thread::sleep(PROBE_INTERVAL * 3);
        assert!(rx.try_recv().is_err());

        monitor
            .start(Arc::new(move |up| {
                let _ = tx.send(up);
            }))
            .expect("restart should pass");
        rx.recv_timeout(Duration::from_secs(2))
            .expect("probe result should arrive after restart");
        monitor.stop().expect("monitor should stop again");
    }
}
