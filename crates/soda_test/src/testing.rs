//! Recording connectors for exercising the harness without a server.

use parking_lot::Mutex;
use soda_core::{Row, SodaError, WarehouseConfiguration, WarehouseConnection, WarehouseConnector};
use std::collections::VecDeque;
use std::sync::Arc;

/// Records connect/close/rollback and every statement as plain strings.
#[derive(Clone, Default)]
pub struct RecordingConnector {
    events: Arc<Mutex<Vec<String>>>,
    responses: Arc<Mutex<VecDeque<Vec<Row>>>>,
    refuse: bool,
    lose_on_rollback: bool,
}

impl RecordingConnector {
    pub fn refusing() -> Self {
        Self { refuse: true, ..Self::default() }
    }

    /// Connections whose rollback reports the session as gone.
    pub fn losing() -> Self {
        Self { lose_on_rollback: true, ..Self::default() }
    }

    pub fn respond(&self, rows: Vec<Row>) {
        self.responses.lock().push_back(rows);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl WarehouseConnector for RecordingConnector {
    fn connect(
        &self,
        configuration: &WarehouseConfiguration,
    ) -> Result<Box<dyn WarehouseConnection>, SodaError> {
        if self.refuse {
            return Err(SodaError::connection("connection refused"));
        }
        let name = configuration.name().unwrap_or("unnamed").to_string();
        self.events.lock().push(format!("connect {name}"));
        Ok(Box::new(RecordingConnection {
            name,
            events: Arc::clone(&self.events),
            responses: Arc::clone(&self.responses),
            closed: false,
            lose_on_rollback: self.lose_on_rollback,
        }))
    }
}

struct RecordingConnection {
    name: String,
    events: Arc<Mutex<Vec<String>>>,
    responses: Arc<Mutex<VecDeque<Vec<Row>>>>,
    closed: bool,
    lose_on_rollback: bool,
}

impl WarehouseConnection for RecordingConnection {
    fn execute(&mut self, sql: &str) -> Result<u64, SodaError> {
        self.events.lock().push(format!("execute {sql}"));
        Ok(1)
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Row>, SodaError> {
        self.events.lock().push(format!("query {sql}"));
        Ok(self.responses.lock().pop_front().unwrap_or_default())
    }

    fn rollback(&mut self) -> Result<(), SodaError> {
        self.events.lock().push("rollback".to_string());
        if self.lose_on_rollback {
            return Err(SodaError::connection("Connection closed"));
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
        self.events.lock().push(format!("close {}", self.name));
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
