//! Driver fed by the test.
//!
//! The test holds a [`DriverHandle`] and plays the user: it pushes
//! [`AppAction`]s and reads back the notices the runtime published.

use std::{convert::Infallible, time::Duration};

use saferchat_app::{AppAction, Driver};
use saferchat_client::{JoinRequest, Notice, SessionError};
use tokio::sync::mpsc;
use tracing::debug;

/// How long [`DriverHandle::wait_for`] waits, in virtual time, before giving
/// up. Long enough to cover several keepalive periods.
const WAIT_LIMIT: Duration = Duration::from_secs(600);

/// [`Driver`] whose input and output are channels.
pub struct ScriptedDriver {
    inputs: mpsc::UnboundedReceiver<AppAction>,
    notices: mpsc::UnboundedSender<Notice>,
    refusals: mpsc::UnboundedSender<SessionError>,
}

/// Test side of a [`ScriptedDriver`]. Dropping it ends the input, which stops
/// the runtime.
pub struct DriverHandle {
    inputs: mpsc::UnboundedSender<AppAction>,
    notices: mpsc::UnboundedReceiver<Notice>,
    refusals: mpsc::UnboundedReceiver<SessionError>,
}

impl ScriptedDriver {
    /// Create a driver and its handle.
    pub fn new() -> (Self, DriverHandle) {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (refusal_tx, refusal_rx) = mpsc::unbounded_channel();

        (
            Self { inputs: input_rx, notices: notice_tx, refusals: refusal_tx },
            DriverHandle { inputs: input_tx, notices: notice_rx, refusals: refusal_rx },
        )
    }
}

impl Driver for ScriptedDriver {
    type Error = Infallible;

    async fn next_action(&mut self) -> Result<Option<AppAction>, Infallible> {
        Ok(self.inputs.recv().await)
    }

    async fn publish(&mut self, notice: Notice) -> Result<(), Infallible> {
        if self.notices.send(notice).is_err() {
            debug!("notice dropped: handle gone");
        }
        Ok(())
    }

    async fn report(&mut self, error: &SessionError) -> Result<(), Infallible> {
        if self.refusals.send(error.clone()).is_err() {
            debug!("refusal dropped: handle gone");
        }
        Ok(())
    }
}

impl DriverHandle {
    /// Push a user action.
    pub fn act(&self, action: AppAction) {
        if self.inputs.send(action).is_err() {
            debug!("action dropped: runtime gone");
        }
    }

    /// Ask to join `channel` as `nickname`.
    pub fn join(&self, nickname: &str, channel: &str, secret: &str) {
        self.act(AppAction::Join(JoinRequest::new(nickname, channel, secret)));
    }

    /// Type a chat message.
    pub fn say(&self, text: &str) {
        self.act(AppAction::SendMessage { text: text.to_string() });
    }

    /// Ask to leave the channel.
    pub fn leave(&self) {
        self.act(AppAction::Leave);
    }

    /// Ask the runtime to quit.
    pub fn quit(&self) {
        self.act(AppAction::Quit);
    }

    /// Next notice, or `None` if the runtime stopped or nothing arrived in
    /// time.
    pub async fn next_notice(&mut self) -> Option<Notice> {
        tokio::time::timeout(WAIT_LIMIT, self.notices.recv()).await.ok().flatten()
    }

    /// Skip notices until one matches `pred` and return it.
    pub async fn wait_for(&mut self, pred: impl Fn(&Notice) -> bool) -> Option<Notice> {
        let wait = async {
            while let Some(notice) = self.notices.recv().await {
                if pred(&notice) {
                    return Some(notice);
                }
            }
            None
        };
        tokio::time::timeout(WAIT_LIMIT, wait).await.ok().flatten()
    }

    /// Notices already published, without waiting.
    pub fn drain(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            notices.push(notice);
        }
        notices
    }

    /// Next local refusal, or `None` if none arrived in time.
    pub async fn next_refusal(&mut self) -> Option<SessionError> {
        tokio::time::timeout(WAIT_LIMIT, self.refusals.recv()).await.ok().flatten()
    }
}
