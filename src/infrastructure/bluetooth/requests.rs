//! Outstanding Command Requests
//!
//! Command frames carry no request id, so a response can only be matched by
//! (device, command, data type, parameter). To keep that match unambiguous at
//! most one request per key is outstanding; a second one is refused with
//! [`Error::RequestInFlight`] until the first resolves.

use crate::domain::error::{Error, Result};
use crate::domain::events::{CommandResponse, DeviceHandle};
use crate::domain::types::{CommandType, DataType, DeviceParameter};
use crate::infrastructure::bluetooth::lock;
use crate::infrastructure::bluetooth::protocol::Command;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

type RequestKey = (DeviceHandle, CommandType, DataType, Option<DeviceParameter>);

fn key(device: DeviceHandle, command: &Command) -> RequestKey {
    (
        device,
        command.command_type(),
        command.data_type(),
        command.parameter(),
    )
}

#[derive(Default)]
pub struct PendingRequests {
    pending: Mutex<HashMap<RequestKey, oneshot::Sender<CommandResponse>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the slot for `command` and return the receiver of its response
    pub fn begin(
        &self,
        device: DeviceHandle,
        command: &Command,
    ) -> Result<oneshot::Receiver<CommandResponse>> {
        let key = key(device, command);
        let mut pending = lock(&self.pending);

        // A caller that stopped waiting frees its slot
        if pending.get(&key).is_some_and(|tx| !tx.is_closed()) {
            return Err(Error::RequestInFlight {
                device,
                command: key.1,
                data_type: key.2,
            });
        }

        let (tx, rx) = oneshot::channel();
        pending.insert(key, tx);
        Ok(rx)
    }

    /// Release the slot without a response (the write never went out)
    pub fn cancel(&self, device: DeviceHandle, command: &Command) {
        lock(&self.pending).remove(&key(device, command));
    }

    /// Hand a response to its waiting request. Returns false if none waits.
    pub fn complete(&self, response: CommandResponse) -> bool {
        let key = (
            response.device,
            response.command,
            response.data_type,
            response.parameter,
        );
        let Some(tx) = lock(&self.pending).remove(&key) else {
            debug!(
                "Unsolicited {} response for {} from {}",
                response.command, response.data_type, response.device
            );
            return false;
        };
        tx.send(response).is_ok()
    }

    /// Drop every request of a device; their callers see the request aborted
    pub fn abort_device(&self, device: DeviceHandle) -> usize {
        let mut pending = lock(&self.pending);
        let before = pending.len();
        pending.retain(|(d, ..), _| *d != device);
        before - pending.len()
    }

    pub fn outstanding(&self) -> usize {
        lock(&self.pending).len()
    }
}
