//! Command sink port: where the control engine sends its decisions.

use std::future::Future;
use std::sync::Arc;

use roomhub_domain::actuator::ActuatorState;
use roomhub_domain::command::Command;
use roomhub_domain::error::HubError;
use roomhub_domain::notification::Notification;
use roomhub_domain::time::Timestamp;

/// Result of dispatching one command.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The actuator changed to this state.
    Applied(ActuatorState),
    /// The command matched the current state; nothing was sent.
    Unchanged,
    /// An automatic command was withheld because the actuator is under
    /// manual control.
    Overridden,
}

/// Receives actuator commands and notifications.
pub trait CommandSink: Send + Sync {
    /// Send a command and commit the resulting actuator state.
    fn dispatch_command(
        &self,
        command: Command,
        at: Timestamp,
    ) -> impl Future<Output = Result<DispatchOutcome, HubError>> + Send;

    /// Record and broadcast a notification. Best effort: never fails.
    fn dispatch_notification(&self, notification: Notification)
    -> impl Future<Output = ()> + Send;
}

impl<T: CommandSink> CommandSink for Arc<T> {
    fn dispatch_command(
        &self,
        command: Command,
        at: Timestamp,
    ) -> impl Future<Output = Result<DispatchOutcome, HubError>> + Send {
        (**self).dispatch_command(command, at)
    }

    fn dispatch_notification(
        &self,
        notification: Notification,
    ) -> impl Future<Output = ()> + Send {
        (**self).dispatch_notification(notification)
    }
}
