//! Command sinks receiving the controller's extend/retract edges.

/// Discrete airbrake command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirbrakeCommand {
    Extend,
    Retract,
}

impl AirbrakeCommand {
    pub fn label(self) -> &'static str {
        match self {
            Self::Extend => "extend",
            Self::Retract => "retract",
        }
    }
}

/// Receiver of state-change commands. Called at most once per controller step.
pub trait AirbrakeCommands {
    fn extend_airbrakes(&mut self);
    fn retract_airbrakes(&mut self);
}

/// Command with the controller time it was issued at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandEvent {
    pub time_s: f64,
    pub command: AirbrakeCommand,
}

/// Sink that records every command it receives, in order.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    commands: Vec<AirbrakeCommand>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[AirbrakeCommand] {
        &self.commands
    }

    pub fn count(&self, command: AirbrakeCommand) -> usize {
        self.commands.iter().filter(|&&c| c == command).count()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl AirbrakeCommands for CommandLog {
    fn extend_airbrakes(&mut self) {
        self.commands.push(AirbrakeCommand::Extend);
    }

    fn retract_airbrakes(&mut self) {
        self.commands.push(AirbrakeCommand::Retract);
    }
}

impl AirbrakeCommands for () {
    fn extend_airbrakes(&mut self) {}

    fn retract_airbrakes(&mut self) {}
}
