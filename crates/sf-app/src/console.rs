//! Line-oriented commands for steering a running kernel.

use sf_sim::KernelHandle;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Start,
    Pause,
    Resume,
    Stop,
    Status,
    Get { model: String, field: String },
    Set { model: String, field: String, value: f64 },
}

pub const HELP: &str = "commands: start | pause | resume | stop | status | get <model> <field> | set <model> <field> <value>";

impl ConsoleCommand {
    /// Parse one input line; blank lines yield `None`.
    pub fn parse(line: &str) -> AppResult<Option<Self>> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let command = match words.as_slice() {
            [] => return Ok(None),
            ["start"] => ConsoleCommand::Start,
            ["pause"] => ConsoleCommand::Pause,
            ["resume"] => ConsoleCommand::Resume,
            ["stop"] => ConsoleCommand::Stop,
            ["status"] => ConsoleCommand::Status,
            ["get", model, field] => ConsoleCommand::Get {
                model: model.to_string(),
                field: field.to_string(),
            },
            ["set", model, field, value] => ConsoleCommand::Set {
                model: model.to_string(),
                field: field.to_string(),
                value: value
                    .parse()
                    .map_err(|_| AppError::InvalidInput(format!("not a number: {value}")))?,
            },
            _ => return Err(AppError::InvalidInput(format!("{line:?}; {HELP}"))),
        };
        Ok(Some(command))
    }

    /// Apply the command and describe the result.
    pub fn execute(&self, handle: &KernelHandle) -> AppResult<String> {
        let reply = match self {
            ConsoleCommand::Start => handle.start()?.to_string(),
            ConsoleCommand::Pause => handle.pause()?.to_string(),
            ConsoleCommand::Resume => handle.resume()?.to_string(),
            ConsoleCommand::Stop => handle.stop()?.to_string(),
            ConsoleCommand::Status => {
                let clock = handle.clock();
                format!("{} tick={} t={:.6}", handle.state(), clock.tick, clock.t)
            }
            ConsoleCommand::Get { model, field } => {
                format!("{model}.{field} = {}", handle.get_field(model, field)?)
            }
            ConsoleCommand::Set {
                model,
                field,
                value,
            } => {
                handle.set_field(model, field, *value)?;
                format!("{model}.{field} <- {value}")
            }
        };
        Ok(reply)
    }
}
