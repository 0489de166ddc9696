/// Default tick action: print a fixed message, mirror it to the log file.
use crate::filelog::FileWriter;
use crate::ticker::{ActionError, TickAction, TickReport};
use std::io::Write;
use std::sync::Arc;

pub struct PrintAction {
    message: String,
    stop_notice: String,
    out: Box<dyn Write + Send>,
    log: Option<Arc<FileWriter>>,
}

impl PrintAction {
    pub fn new(message: impl Into<String>, stop_notice: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stop_notice: stop_notice.into(),
            out: Box::new(std::io::stdout()),
            log: None,
        }
    }

    /// Redirect printed lines (stdout by default).
    #[cfg(test)]
    pub fn with_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.out = out;
        self
    }

    pub fn with_log(mut self, log: Arc<FileWriter>) -> Self {
        self.log = Some(log);
        self
    }

    fn emit(&mut self, line: &str) -> Result<(), ActionError> {
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        if let Some(log) = &self.log {
            log.write(line)?;
        }
        Ok(())
    }
}

impl TickAction for PrintAction {
    async fn tick(&mut self, _tick: u64) -> Result<(), ActionError> {
        let line = self.message.clone();
        self.emit(&line)
    }

    async fn stop(&mut self, report: &TickReport) {
        let line = self.stop_notice.clone();
        if let Err(e) = self.emit(&line) {
            tracing::warn!(error = %e, ticks = report.ticks, "failed to emit stop notice");
        }
    }
}
