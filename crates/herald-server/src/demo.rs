//! Simulated robot producer.
//!
//! Stands in for the robot backend during frontend development: a short
//! scripted sequence of responses, the last one carrying audio.

use bytes::Bytes;
use herald_core::Broadcaster;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Fixed audio payload attached to the greeting.
pub const FAKE_AUDIO: &[u8] = b"fake audio data";

struct Step {
    delay: Duration,
    text: &'static str,
    audio: Option<&'static [u8]>,
}

static SCRIPT: [Step; 3] = [
    Step {
        delay: Duration::from_secs(2),
        text: "Robot initialized",
        audio: None,
    },
    Step {
        delay: Duration::from_secs(3),
        text: "Camera connected",
        audio: None,
    },
    Step {
        delay: Duration::from_secs(5),
        text: "Hello! How can I help?",
        audio: Some(FAKE_AUDIO),
    },
];

/// Play the script once. Returns the total number of deliveries.
pub async fn run(broadcaster: Arc<Broadcaster>) -> usize {
    let mut delivered = 0;
    for step in &SCRIPT {
        tokio::time::sleep(step.delay).await;
        let n = broadcaster.send_response(step.text, step.audio.map(Bytes::from_static));
        info!(text = step.text, recipients = n, "Demo response published");
        delivered += n;
    }
    delivered
}

/// Play the script on its own task.
pub fn spawn(broadcaster: Arc<Broadcaster>) -> JoinHandle<usize> {
    tokio::spawn(run(broadcaster))
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{Registry, TransportKind};

    #[tokio::test(start_paused = true)]
    async fn test_script_timing_and_content() {
        let registry = Arc::new(Registry::new());
        let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&registry)));
        let conn = registry.register(TransportKind::Push).unwrap();

        let task = spawn(Arc::clone(&broadcaster));

        tokio::time::sleep(Duration::from_millis(1_900)).await;
        assert!(conn.mailbox().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(conn.mailbox().try_recv().unwrap().text(), Some("Robot initialized"));

        assert_eq!(task.await.unwrap(), 3);
        assert_eq!(conn.mailbox().try_recv().unwrap().text(), Some("Camera connected"));

        let greeting = conn.mailbox().try_recv().unwrap();
        assert_eq!(greeting.text(), Some("Hello! How can I help?"));
        assert_eq!(greeting.audio().map(|a| a.as_ref()), Some(FAKE_AUDIO));
    }
}
