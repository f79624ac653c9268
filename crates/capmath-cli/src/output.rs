pub mod stream_writer;

use std::io;

use capmath_core::Envelope;
use serde_json::Value;

use self::stream_writer::EnvelopeStream;
use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(
    envelope: &Envelope<Value>,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            println!("{payload}");
        }
        OutputFormat::Ndjson => {
            let payload = serde_json::to_string(envelope)?;
            println!("{payload}");
        }
        OutputFormat::Table => render_table(envelope)?,
    }

    Ok(())
}

/// Streams the envelope to stdout as NDJSON events.
pub fn render_stream(envelope: &Envelope<Value>) -> Result<(), CliError> {
    EnvelopeStream::new(io::stdout().lock()).write(envelope)
}

fn render_table(envelope: &Envelope<Value>) -> Result<(), CliError> {
    println!("request_id  : {}", envelope.meta.request_id);
    println!("schema      : {}", envelope.meta.schema_version);
    println!("generated_at: {}", envelope.meta.generated_at);
    println!("computation : {}", envelope.meta.computation);
    println!("elapsed_us  : {}", envelope.meta.elapsed_us);

    if !envelope.meta.warnings.is_empty() {
        println!("warnings:");
        for warning in &envelope.meta.warnings {
            println!("  - {warning}");
        }
    }

    println!("data:");
    let pretty_data = serde_json::to_string_pretty(&envelope.data)?;
    for line in pretty_data.lines() {
        println!("  {line}");
    }

    if !envelope.errors.is_empty() {
        println!("errors:");
        for error in &envelope.errors {
            match &error.scenario {
                Some(scenario) => println!("  - [{scenario}] {}: {}", error.code, error.message),
                None => println!("  - {}: {}", error.code, error.message),
            }
        }
    }

    Ok(())
}
