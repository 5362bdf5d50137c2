use std::io::{self, Stderr, Stdout, Write};

/// The streams an evacuation writes to.
///
/// Printed Pods are written to `output`, while banners announcing each Node go to `diagnostic`.
pub struct Sinks<O: Write, D: Write> {
    pub output: O,
    pub diagnostic: D,
}

impl<O: Write, D: Write> Sinks<O, D> {
    pub fn new(output: O, diagnostic: D) -> Self {
        Sinks { output, diagnostic }
    }
}

impl Sinks<Stdout, Stderr> {
    /// Sinks backed by the process's standard output and standard error.
    pub fn stdio() -> Self {
        Sinks::new(io::stdout(), io::stderr())
    }
}
