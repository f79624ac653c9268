//! NDJSON event stream for a single response envelope.
//!
//! Each line is `{"event", "seq", "ts", "data"?, "error"?}`. A run emits
//! `start`, a `chunk` per scenario, an `error` per failed scenario and a
//! closing `end`.

use std::io::Write;

use capmath_core::{Computation, Envelope, EnvelopeError, UtcTimestamp};
use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum EventKind {
    Start,
    Chunk,
    Error,
    End,
}

#[derive(Serialize)]
struct Event<'a, D> {
    event: EventKind,
    seq: u64,
    ts: UtcTimestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<D>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<FailureBody<'a>>,
}

#[derive(Serialize)]
struct StartPayload<'a> {
    request_id: &'a str,
    schema_version: &'a str,
    computation: Computation,
    scenario_count: usize,
}

#[derive(Serialize)]
struct EndPayload<'a> {
    status: &'static str,
    elapsed_us: u64,
    warnings: &'a [String],
    error_count: usize,
}

#[derive(Serialize)]
struct ScenarioRef<'a> {
    scenario: &'a str,
}

#[derive(Serialize)]
struct FailureBody<'a> {
    code: &'a str,
    message: &'a str,
}

impl<'a> From<&'a EnvelopeError> for FailureBody<'a> {
    fn from(error: &'a EnvelopeError) -> Self {
        Self {
            code: &error.code,
            message: &error.message,
        }
    }
}

/// Writes an envelope as numbered events, flushing after every line.
pub struct EnvelopeStream<W: Write> {
    sink: W,
    seq: u64,
}

impl<W: Write> EnvelopeStream<W> {
    pub fn new(sink: W) -> Self {
        Self { sink, seq: 0 }
    }

    /// Multi-exit waterfalls stream `data.scenarios` one per chunk; any other
    /// payload is a single chunk.
    pub fn write(mut self, envelope: &Envelope<Value>) -> Result<(), CliError> {
        let chunks: Vec<&Value> = match envelope.data.get("scenarios") {
            Some(Value::Array(scenarios)) => scenarios.iter().collect(),
            _ => vec![&envelope.data],
        };
        let meta = &envelope.meta;

        self.emit(
            EventKind::Start,
            Some(StartPayload {
                request_id: &meta.request_id,
                schema_version: &meta.schema_version,
                computation: meta.computation,
                scenario_count: chunks.len() + envelope.errors.len(),
            }),
            None,
        )?;

        for chunk in chunks {
            self.emit(EventKind::Chunk, Some(chunk), None)?;
        }

        for error in &envelope.errors {
            let scenario = error
                .scenario
                .as_deref()
                .map(|scenario| ScenarioRef { scenario });
            self.emit(EventKind::Error, scenario, Some(error.into()))?;
        }

        self.emit(
            EventKind::End,
            Some(EndPayload {
                status: if envelope.errors.is_empty() { "ok" } else { "error" },
                elapsed_us: meta.elapsed_us,
                warnings: &meta.warnings,
                error_count: envelope.errors.len(),
            }),
            None,
        )
    }

    fn emit<D: Serialize>(
        &mut self,
        event: EventKind,
        data: Option<D>,
        error: Option<FailureBody<'_>>,
    ) -> Result<(), CliError> {
        self.seq += 1;
        let line = serde_json::to_string(&Event {
            event,
            seq: self.seq,
            ts: UtcTimestamp::now(),
            data,
            error,
        })?;
        writeln!(self.sink, "{line}")?;
        self.sink.flush()?;
        Ok(())
    }
}
