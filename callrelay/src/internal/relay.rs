use tokio::sync::mpsc::UnboundedSender;

use super::fatal;
use crate::{Activity, Call};

/// Publishing end of the harness relay, shared by every stand-in.
#[repr(transparent)]
#[derive(Clone)]
pub(crate) struct Relay(UnboundedSender<Activity>);

impl Relay {
    pub fn publish(&self, call: Call) {
        let call_id = call.id();
        let description = call.to_string();
        if self.0.send(Activity::Call(call)).is_err() {
            fatal(format_args!(
                "relay closed: no harness is listening for {description}"
            ));
        }
        tracing::debug!(%call_id, call = %description, "call published");
    }
}

impl From<UnboundedSender<Activity>> for Relay {
    fn from(sender: UnboundedSender<Activity>) -> Self {
        Relay(sender)
    }
}
