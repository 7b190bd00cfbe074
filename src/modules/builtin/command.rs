use crate::modules::{Archetype, Finding, Module, ParamScheme, ParamSpec, Sink};

/// User-defined module: any program, either archetype, line-based output.
///
/// Every non-empty output line becomes a [`Finding::Line`].
///
/// # Example
/// ```
/// use netvisor::{Archetype, CommandModule, Module, ParamSpec};
///
/// let m = CommandModule::new("probe", "curl", Archetype::Active)
///     .param(ParamSpec::flag("silent", "-s").default_value("yes"))
///     .with_timer(30);
/// assert_eq!(m.timer(), 30);
/// ```
#[derive(Clone, Debug)]
pub struct CommandModule {
    id: String,
    program: String,
    archetype: Archetype,
    scheme: ParamScheme,
    timer: u64,
    max_duration: u64,
    read_interval: u64,
}

impl CommandModule {
    /// Module with an empty scheme and default timings.
    pub fn new(id: impl Into<String>, program: impl Into<String>, archetype: Archetype) -> Self {
        Self {
            id: id.into(),
            program: program.into(),
            archetype,
            scheme: ParamScheme::new(),
            timer: 60,
            max_duration: 120,
            read_interval: 10,
        }
    }

    /// Adds a parameter declaration.
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.scheme = self.scheme.with(spec);
        self
    }

    /// Sets the default queue countdown (ticks).
    pub fn with_timer(mut self, ticks: u64) -> Self {
        self.timer = ticks;
        self
    }

    /// Sets the maximum active run duration (ticks).
    pub fn with_max_duration(mut self, ticks: u64) -> Self {
        self.max_duration = ticks;
        self
    }

    /// Sets the passive polling interval (ticks).
    pub fn with_read_interval(mut self, ticks: u64) -> Self {
        self.read_interval = ticks;
        self
    }
}

impl Module for CommandModule {
    fn id(&self) -> &str {
        &self.id
    }

    fn archetype(&self) -> Archetype {
        self.archetype
    }

    fn program(&self) -> &str {
        &self.program
    }

    fn scheme(&self) -> &ParamScheme {
        &self.scheme
    }

    fn parse_output(&self, raw: &[u8], _hosts: &[String], sink: &dyn Sink) {
        for line in String::from_utf8_lossy(raw).lines() {
            let line = line.trim_end();
            if !line.is_empty() {
                sink.report(&self.id, Finding::Line { line: line.to_string() });
            }
        }
    }

    fn timer(&self) -> u64 {
        self.timer
    }

    fn max_duration(&self) -> u64 {
        self.max_duration
    }

    fn read_interval(&self) -> u64 {
        self.read_interval
    }
}
