//! Line-oriented terminal driver.
//!
//! Reads one command per input line and writes one line per notice. Output
//! goes through a blocking [`Write`] so a notice is never cut short when the
//! runtime cancels a pending read.

use std::io::{self, Write};

use saferchat_app::{AppAction, Driver};
use saferchat_client::{JoinRequest, Notice, PeerSummary, SessionError};
use saferchat_crypto::Fingerprint;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::{
    commands::{self, Command},
    render,
};

/// Terminal driver errors.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// Reading input or writing output failed.
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// [`Driver`] over a line reader and a writer, usually stdin and stdout.
pub struct TerminalDriver<R, W> {
    lines: Lines<R>,
    out: W,
    fingerprint: Fingerprint,
    startup_join: Option<JoinRequest>,
    nickname: Option<String>,
    channel: Option<String>,
    peers: Vec<PeerSummary>,
}

impl<R, W> TerminalDriver<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    /// Create a driver. `fingerprint` is the local key, shown by `/whoami`.
    pub fn new(input: R, out: W, fingerprint: Fingerprint) -> Self {
        Self {
            lines: input.lines(),
            out,
            fingerprint,
            startup_join: None,
            nickname: None,
            channel: None,
            peers: Vec::new(),
        }
    }

    /// Join `request` before reading any input.
    #[must_use]
    pub fn with_join(mut self, request: JoinRequest) -> Self {
        self.nickname = Some(request.nickname.clone());
        self.startup_join = Some(request);
        self
    }

    /// The output writer.
    pub fn output(&self) -> &W {
        &self.out
    }

    fn line(&mut self, text: &str) -> Result<(), TerminalError> {
        writeln!(self.out, "{text}")?;
        self.out.flush()?;
        Ok(())
    }

    /// Turn a command into a runtime request, answering local queries
    /// directly.
    fn interpret(&mut self, command: Command) -> Result<Option<AppAction>, TerminalError> {
        let action = match command {
            Command::Join { channel, nickname, secret } => {
                self.nickname = Some(nickname.clone());
                AppAction::Join(JoinRequest::new(nickname, channel, secret))
            },
            Command::Leave => AppAction::Leave,
            Command::Quit => AppAction::Quit,
            Command::Message { content } if content.is_empty() => return Ok(None),
            Command::Message { content } => AppAction::SendMessage { text: content },
            Command::Peers => {
                let table = render::peers(&self.peers);
                self.line(&table)?;
                return Ok(None);
            },
            Command::WhoAmI => {
                let text = self.whoami();
                self.line(&text)?;
                return Ok(None);
            },
            Command::Unknown { input } => {
                self.line(&format!("!! unknown command: {input}"))?;
                return Ok(None);
            },
            Command::InvalidArgs { command, error } => {
                self.line(&format!("!! /{command}: {error}"))?;
                return Ok(None);
            },
        };
        Ok(Some(action))
    }

    fn whoami(&self) -> String {
        let name = self.nickname.as_deref().unwrap_or("(no nickname)");
        match &self.channel {
            Some(channel) => format!("-- {name} in #{channel}, key {}", self.fingerprint),
            None => format!("-- {name}, not in a channel, key {}", self.fingerprint),
        }
    }
}

impl<R, W> Driver for TerminalDriver<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    type Error = TerminalError;

    async fn next_action(&mut self) -> Result<Option<AppAction>, TerminalError> {
        if let Some(request) = self.startup_join.take() {
            return Ok(Some(AppAction::Join(request)));
        }

        while let Some(line) = self.lines.next_line().await? {
            if let Some(action) = self.interpret(commands::parse(&line))? {
                return Ok(Some(action));
            }
        }
        Ok(None)
    }

    async fn publish(&mut self, notice: Notice) -> Result<(), TerminalError> {
        match &notice {
            Notice::Roster(peers) => self.peers.clone_from(peers),
            Notice::Joined { channel, .. } => self.channel = Some(channel.clone()),
            Notice::Left { .. } => self.channel = None,
            _ => {},
        }

        if let Some(text) = render::notice(&notice) {
            self.line(&text)?;
        }
        Ok(())
    }

    async fn report(&mut self, error: &SessionError) -> Result<(), TerminalError> {
        self.line(&render::refusal(error))
    }
}
