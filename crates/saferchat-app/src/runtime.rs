//! Generic runtime.
//!
//! Owns a [`Session`], the single-connection [`Link`] and a [`Driver`], and
//! runs one select loop over three sources: inbound relay events, user
//! requests and the session's next timer deadline. Every source turns into a
//! [`SessionEvent`]; the resulting [`SessionAction`]s are executed in order
//! before the loop polls again, so the session sees one event at a time.

use std::{collections::VecDeque, future};

use saferchat_client::{Session, SessionAction, SessionEvent};
use saferchat_core::{Environment, Link, Transport, TransportError, TransportEvent};
use tracing::{debug, error, info, warn};

use crate::{AppAction, Driver, RuntimeError};

/// Orchestrates a session against a transport and a frontend.
pub struct Runtime<E: Environment, T: Transport, D: Driver> {
    env: E,
    session: Session<E>,
    link: Link<T>,
    driver: D,
}

impl<E: Environment, T: Transport, D: Driver> Runtime<E, T, D> {
    /// Create a runtime. Nothing happens until [`Self::run`].
    pub fn new(session: Session<E>, link: Link<T>, driver: D) -> Self {
        let env = session.env().clone();
        Self { env, session, link, driver }
    }

    /// The session being driven.
    pub fn session(&self) -> &Session<E> {
        &self.session
    }

    /// Run until the driver quits or input ends.
    ///
    /// Connects to the relay right away. The connection is closed on every
    /// exit path. Returns the session for inspection.
    ///
    /// # Errors
    ///
    /// A fatal session error or a driver failure.
    pub async fn run(mut self) -> Result<Session<E>, RuntimeError<D::Error>> {
        info!(endpoint = %self.link.endpoint(), "runtime started");
        let result = self.event_loop().await;
        self.link.close().await;

        match result {
            Ok(()) => {
                info!("runtime stopped");
                Ok(self.session)
            },
            Err(e) => {
                error!(error = %e, "runtime failed");
                Err(e)
            },
        }
    }

    async fn event_loop(&mut self) -> Result<(), RuntimeError<D::Error>> {
        let actions = self.session.start();
        self.execute(actions).await?;

        loop {
            let wait = self
                .session
                .next_deadline()
                .map(|at| at.saturating_duration_since(self.env.now()));
            let env = &self.env;
            let timer = async move {
                match wait {
                    Some(duration) => env.sleep(duration).await,
                    None => future::pending().await,
                }
            };

            tokio::select! {
                event = self.link.recv() => {
                    let event = match event {
                        TransportEvent::FrameReceived(text) => SessionEvent::FrameReceived { text },
                        TransportEvent::Error(e) => SessionEvent::TransportError { cause: e.to_string() },
                        TransportEvent::Closed => SessionEvent::TransportClosed,
                    };
                    let actions = self.feed(event)?;
                    self.execute(actions).await?;
                },
                input = self.driver.next_action() => {
                    match input.map_err(RuntimeError::Driver)? {
                        None | Some(AppAction::Quit) => {
                            self.leave_if_joined().await?;
                            return Ok(());
                        },
                        Some(action) => self.user_action(action).await?,
                    }
                },
                () = timer => {
                    let actions = self.session.tick();
                    self.execute(actions).await?;
                },
            }
        }
    }

    async fn user_action(&mut self, action: AppAction) -> Result<(), RuntimeError<D::Error>> {
        let event = match action {
            AppAction::Join(request) => SessionEvent::Join(request),
            AppAction::SendMessage { text } => SessionEvent::SendText { text },
            AppAction::Leave => SessionEvent::Leave,
            AppAction::Quit => return Ok(()),
        };

        match self.session.handle(event) {
            Ok(actions) => self.execute(actions).await,
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                debug!(error = %e, "request refused");
                self.driver.report(&e).await.map_err(RuntimeError::Driver)
            },
        }
    }

    async fn leave_if_joined(&mut self) -> Result<(), RuntimeError<D::Error>> {
        if self.session.channel().is_none() {
            return Ok(());
        }
        let actions = self.feed(SessionEvent::Leave)?;
        self.execute(actions).await
    }

    /// Deliver an event that did not come from the user. Non-fatal errors
    /// mean the event raced a state change and are dropped.
    fn feed(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, RuntimeError<D::Error>> {
        match self.session.handle(event) {
            Ok(actions) => Ok(actions),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                warn!(error = %e, "session refused internal event");
                Ok(Vec::new())
            },
        }
    }

    async fn execute(&mut self, actions: Vec<SessionAction>) -> Result<(), RuntimeError<D::Error>> {
        let mut queue = VecDeque::from(actions);

        while let Some(action) = queue.pop_front() {
            match action {
                SessionAction::Connect => {
                    let limit = self.session.config().connect_timeout;
                    let attempt = tokio::select! {
                        result = self.link.connect() => result,
                        () = self.env.sleep(limit) => {
                            Err(TransportError::Connect(format!("timed out after {limit:?}")))
                        },
                    };
                    let event = match attempt {
                        Ok(()) => SessionEvent::Connected,
                        Err(e) => {
                            warn!(endpoint = %self.link.endpoint(), error = %e, "connect failed");
                            SessionEvent::TransportError { cause: e.to_string() }
                        },
                    };
                    queue.extend(self.feed(event)?);
                },
                SessionAction::Send(frame) => {
                    if let Err(e) = self.link.send(&frame).await {
                        warn!(kind = frame.kind(), error = %e, "send failed");
                        queue.extend(self.feed(SessionEvent::TransportError { cause: e.to_string() })?);
                    }
                },
                SessionAction::Publish(notice) => {
                    self.driver.publish(notice).await.map_err(RuntimeError::Driver)?;
                },
            }
        }

        Ok(())
    }
}
