//! Generic runtime for application orchestration.
//!
//! The Runtime drives the application event loop, coordinating between:
//! - [`App`]: UI state machine
//! - [`Bridge`]: Protocol bridge to Client
//! - [`Driver`]: Platform-specific I/O

use parley_client::ClientConfig;
use parley_core::Environment;
use parley_proto::User;

use crate::{App, AppAction, AppEvent, Bridge, Driver, DriverInput, Effect};

/// Generic runtime that orchestrates App, Bridge, and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `E`: Environment the client reads time from
pub struct Runtime<D, E>
where
    D: Driver,
    E: Environment,
{
    driver: D,
    app: App<E::Instant>,
    bridge: Bridge<E>,
    realtime: bool,
}

impl<D, E> Runtime<D, E>
where
    D: Driver<Instant = E::Instant>,
    E: Environment,
{
    /// Create a runtime for `viewer`. `realtime` decides whether the
    /// WebSocket is opened at start.
    pub fn new(driver: D, env: E, viewer: User, config: ClientConfig, realtime: bool) -> Self {
        let app = App::new(viewer.clone());
        let bridge = Bridge::new(env, viewer, config);
        Self { driver, app, bridge, realtime }
    }

    /// Run the main event loop until the App quits.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn run(mut self) -> Result<(), D::Error> {
        if !self.start().await? {
            while !self.step().await? {}
        }
        self.driver.stop();
        Ok(())
    }

    /// Render once, load the initial lists and start realtime.
    ///
    /// Returns `true` if the application should quit.
    pub async fn start(&mut self) -> Result<bool, D::Error> {
        self.driver.render(&self.app)?;
        let now = self.driver.now();
        let events = self.bridge.start(self.realtime, now);
        self.process_bridge_events(events).await
    }

    /// Process one input (if any arrives before the next timer) and tick.
    ///
    /// Returns `true` if the application should quit.
    pub async fn step(&mut self) -> Result<bool, D::Error> {
        let deadline = earliest(self.bridge.next_deadline(), self.app.next_deadline());
        let input = self.driver.poll_input(deadline).await?;

        if let Some(input) = input
            && self.process_input(input).await?
        {
            return Ok(true);
        }

        let now = self.driver.now();
        let events = self.bridge.handle_tick(now);
        if self.process_bridge_events(events).await? {
            return Ok(true);
        }
        let actions = self.app.handle(AppEvent::Tick { now });
        self.process_actions(actions).await
    }

    /// Get a reference to the App.
    pub fn app(&self) -> &App<E::Instant> {
        &self.app
    }

    /// Get a reference to the Bridge.
    pub fn bridge(&self) -> &Bridge<E> {
        &self.bridge
    }

    /// Get a reference to the Driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get a mutable reference to the Driver.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    async fn process_input(&mut self, input: DriverInput<E::Instant>) -> Result<bool, D::Error> {
        let now = self.driver.now();
        let events = match input {
            DriverInput::App(event) => {
                let actions = self.app.handle(event);
                return self.process_actions(actions).await;
            },
            DriverInput::Opened => self.bridge.handle_opened(now),
            DriverInput::Closed { reason } => self.bridge.handle_closed(reason, now),
            DriverInput::Failed { reason } => self.bridge.handle_failed(reason, now),
            DriverInput::Frame(raw) => self.bridge.handle_frame(raw, now),
            DriverInput::Rest(result) => self.bridge.handle_rest(result),
        };
        self.process_bridge_events(events).await
    }

    /// Process actions returned by the App.
    ///
    /// Returns `true` if should quit.
    async fn process_actions(&mut self, initial_actions: Vec<AppAction>) -> Result<bool, D::Error> {
        let mut pending_actions = initial_actions;
        let mut quit = false;

        while !pending_actions.is_empty() {
            let actions = std::mem::take(&mut pending_actions);

            for action in actions {
                match action {
                    AppAction::Render => self.driver.render(&self.app)?,
                    AppAction::Quit => quit = true,
                    AppAction::Notify { title, body, tag } => {
                        self.driver.execute(Effect::Notify { title, body, tag }).await?;
                    },

                    // Protocol operations go through the bridge
                    AppAction::OpenChat { .. }
                    | AppAction::CloseChat
                    | AppAction::SendMessage { .. }
                    | AppAction::SetTyping { .. }
                    | AppAction::Unfriend { .. }
                    | AppAction::CreateGroup { .. }
                    | AppAction::Refresh
                    | AppAction::EnableRealtime
                    | AppAction::DisableRealtime
                    | AppAction::Logout => {
                        let now = self.driver.now();
                        let events = self.bridge.process_app_action(action, now);
                        for event in events {
                            pending_actions.extend(self.app.handle(event));
                        }
                    },
                }
            }
            self.send_outgoing().await?;
        }
        Ok(quit)
    }

    /// Process events from Bridge back to App.
    async fn process_bridge_events(
        &mut self,
        events: Vec<AppEvent<E::Instant>>,
    ) -> Result<bool, D::Error> {
        let mut actions = Vec::new();
        for event in events {
            actions.extend(self.app.handle(event));
        }
        // Bridge effects go out even with no App actions.
        let quit = self.process_actions(actions).await?;
        self.send_outgoing().await?;
        Ok(quit)
    }

    /// Hand every pending effect to the driver.
    async fn send_outgoing(&mut self) -> Result<(), D::Error> {
        for effect in self.bridge.take_outgoing() {
            self.driver.execute(effect).await?;
        }
        Ok(())
    }
}

fn earliest<I: Ord>(a: Option<I>, b: Option<I>) -> Option<I> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
