//! Capture Replay
//!
//! Feeds recorded notifications through the service without a radio. A
//! capture is a JSON-lines file, one notification per line:
//!
//! ```text
//! {"device": 176032588775425, "characteristic": "00000206-0000-1000-8000-a0e5e9000000", "data": [1, 0]}
//! ```

use crate::domain::events::DeviceHandle;
use crate::infrastructure::bluetooth::transport::{Submission, Transport};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// One recorded characteristic notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedNotification {
    pub device: u64,
    pub characteristic: Uuid,
    pub data: Vec<u8>,
}

impl CapturedNotification {
    pub fn handle(&self) -> DeviceHandle {
        DeviceHandle::from_address(self.device)
    }
}

pub fn parse_capture(contents: &str) -> anyhow::Result<Vec<CapturedNotification>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", index + 1))
        })
        .collect()
}

pub fn load_capture(path: &Path) -> anyhow::Result<Vec<CapturedNotification>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read capture {}", path.display()))?;
    parse_capture(&contents).with_context(|| format!("Malformed capture {}", path.display()))
}

/// Transport with no radio behind it: every request completes at once
#[derive(Debug, Default)]
pub struct ReplayTransport;

impl Transport for ReplayTransport {
    fn connect(&self, device: DeviceHandle) -> Submission {
        debug!("replay: connect {}", device);
        Submission::Confirmed
    }

    fn write_notification_descriptor(
        &self,
        device: DeviceHandle,
        characteristic: Uuid,
        enable: bool,
    ) -> Submission {
        debug!(
            "replay: notifications {} on {} for {}",
            if enable { "on" } else { "off" },
            characteristic,
            device
        );
        Submission::Confirmed
    }

    fn write_characteristic(
        &self,
        device: DeviceHandle,
        characteristic: Uuid,
        value: &[u8],
    ) -> Submission {
        debug!("replay: write {:02X?} to {} on {}", value, characteristic, device);
        Submission::Confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::protocol::BUTTON_CHAR_UUID;

    #[test]
    fn test_parse_capture_skips_blank_lines() {
        let contents = r#"
{"device": 1, "characteristic": "00000206-0000-1000-8000-a0e5e9000000", "data": [1, 0]}

{"device": 2, "characteristic": "0000020b-0000-1000-8000-a0e5e9000000", "data": []}
"#;
        let capture = parse_capture(contents).unwrap();
        assert_eq!(capture.len(), 2);
        assert_eq!(capture[0].characteristic, BUTTON_CHAR_UUID);
        assert_eq!(capture[0].data, vec![1, 0]);
        assert_eq!(capture[1].handle(), DeviceHandle::from_address(2));
    }

    #[test]
    fn test_parse_capture_reports_line() {
        let err = parse_capture("{\"device\": 1}\n").unwrap_err();
        assert!(format!("{:#}", err).contains("line 1"));
    }

    #[test]
    fn test_load_capture_missing_file() {
        let path = std::env::temp_dir().join("openspatial-missing-capture.jsonl");
        assert!(load_capture(&path).is_err());
    }
}
