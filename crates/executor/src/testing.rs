//! Scripted provider and recording sleeper for exercising the retry loop
//! without a server or real sleeps.
//!
//! Responses are consumed in order across every connection the provider
//! opens, so a script reads as "what the server does next" regardless of how
//! many reconnects happen in between.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use resql_core::{ConnectionConfig, ConnectionId, Error, Params, Result, Row};

use crate::backoff::Sleeper;
use crate::connection::{Connection, ConnectionProvider};

/// What the next statement does.
#[derive(Debug, Clone)]
pub enum Step {
    /// Return these rows
    Rows(Vec<Row>),
    /// Fail with this error; the handle stays open
    Fail(Error),
    /// Fail with this error and mark the handle closed
    Drop(Error),
}

impl Step {
    /// Succeed with rows
    pub fn rows(rows: Vec<Row>) -> Self {
        Step::Rows(rows)
    }

    /// Transient failure on a handle that stays open
    pub fn transient(message: &str) -> Self {
        Step::Fail(Error::transient(message))
    }

    /// Terminal failure
    pub fn terminal(message: &str) -> Self {
        Step::Fail(Error::terminal(message))
    }

    /// Transient failure that also closes the handle
    pub fn dropped(message: &str) -> Self {
        Step::Drop(Error::transient(message))
    }
}

/// A statement as the scripted server saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Handle the statement was issued on
    pub connection: ConnectionId,
    /// SQL text
    pub sql: String,
    /// Bind values
    pub params: Params,
}

#[derive(Default)]
struct ScriptState {
    steps: VecDeque<Step>,
    connect_results: VecDeque<Result<()>>,
    ping_results: VecDeque<Result<()>>,
    connect_calls: usize,
    ping_calls: usize,
    connections: Vec<ConnectionId>,
    statements: Vec<Statement>,
    closed_handle_queries: usize,
    severed: HashSet<ConnectionId>,
}

/// A provider whose connections replay a shared script.
///
/// Clones share state, so a test keeps one clone for inspection while the
/// executor owns another.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedProvider {
    /// Provider with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next statement response
    pub fn push(&self, step: Step) {
        self.state.lock().steps.push_back(step);
    }

    /// Queue the same response `n` times
    pub fn push_n(&self, n: usize, step: Step) {
        let mut state = self.state.lock();
        for _ in 0..n {
            state.steps.push_back(step.clone());
        }
    }

    /// Queue the result of the next `connect` call. Unscripted connects succeed.
    pub fn push_connect(&self, result: Result<()>) {
        self.state.lock().connect_results.push_back(result);
    }

    /// Queue the result of the next `ping` on an open handle. Unscripted pings succeed.
    pub fn push_ping(&self, result: Result<()>) {
        self.state.lock().ping_results.push_back(result);
    }

    /// Number of `connect` calls, successful or not
    pub fn connect_calls(&self) -> usize {
        self.state.lock().connect_calls
    }

    /// Number of `ping` calls
    pub fn ping_calls(&self) -> usize {
        self.state.lock().ping_calls
    }

    /// Ids of every handle opened, in order
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.state.lock().connections.clone()
    }

    /// Every statement issued on an open handle, in order
    pub fn statements(&self) -> Vec<Statement> {
        self.state.lock().statements.clone()
    }

    /// Statements attempted on a handle that was already closed
    pub fn closed_handle_queries(&self) -> usize {
        self.state.lock().closed_handle_queries
    }

    /// Close every handle opened so far, as if the server dropped them while
    /// idle. The owner sees it only through `is_open`.
    pub fn sever_open_handles(&self) {
        let mut state = self.state.lock();
        let opened = state.connections.clone();
        state.severed.extend(opened);
    }

    /// Responses not yet consumed
    pub fn remaining_steps(&self) -> usize {
        self.state.lock().steps.len()
    }
}

impl ConnectionProvider for ScriptedProvider {
    type Connection = ScriptedConnection;

    fn connect(&self, _config: &ConnectionConfig) -> Result<ScriptedConnection> {
        let mut state = self.state.lock();
        state.connect_calls += 1;
        if let Some(Err(e)) = state.connect_results.pop_front() {
            return Err(e);
        }
        let id = ConnectionId::new();
        state.connections.push(id);
        Ok(ScriptedConnection {
            id,
            open: true,
            state: Arc::clone(&self.state),
        })
    }
}

/// Handle produced by [`ScriptedProvider`].
pub struct ScriptedConnection {
    id: ConnectionId,
    open: bool,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedConnection {
    fn open_in(&self, state: &ScriptState) -> bool {
        self.open && !state.severed.contains(&self.id)
    }
}

impl Connection for ScriptedConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open_in(&self.state.lock())
    }

    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        let mut state = self.state.lock();
        if !self.open_in(&state) {
            state.closed_handle_queries += 1;
            return Err(Error::ConnectionClosed);
        }
        state.statements.push(Statement {
            connection: self.id,
            sql: sql.to_string(),
            params: params.clone(),
        });
        match state.steps.pop_front() {
            Some(Step::Rows(rows)) => Ok(rows),
            Some(Step::Fail(e)) => Err(e),
            Some(Step::Drop(e)) => {
                self.open = false;
                Err(e)
            }
            None => Err(Error::terminal("no scripted response")),
        }
    }

    fn ping(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.ping_calls += 1;
        if !self.open_in(&state) {
            return Err(Error::ConnectionClosed);
        }
        state.ping_results.pop_front().unwrap_or(Ok(()))
    }

    fn close(&mut self) {
        self.open = false;
    }
}

/// Records requested delays instead of sleeping.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Sleeper with no recorded delays
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay requested so far
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }

    /// Number of sleeps requested
    pub fn count(&self) -> usize {
        self.delays.lock().len()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, delay: Duration) {
        self.delays.lock().push(delay);
    }
}
