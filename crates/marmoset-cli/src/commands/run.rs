//! Run command - evaluate a script file in a fresh context.

use anyhow::{Result, anyhow};
use clap::Args;
use crossbeam_channel::{bounded, select};
use marmoset_core::{Context, InterruptHandle};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;

#[derive(Args)]
pub struct RunCommand {
    /// File to execute
    pub entry: PathBuf,

    /// Interrupt the script after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl RunCommand {
    pub fn run(&self, config: &Config) -> Result<()> {
        if let Some(output) = self.evaluate(config)? {
            println!("{}", output);
        }
        Ok(())
    }

    /// Evaluate the entry file, returning its completion value unless it is `undefined`
    fn evaluate(&self, config: &Config) -> Result<Option<String>> {
        let source = std::fs::read(&self.entry)
            .map_err(|e| anyhow!("Failed to read {}: {}", self.entry.display(), e))?;
        let name = self.entry.to_string_lossy();

        let ctx = Context::with_options(config.context.clone())?;
        let watchdog = self
            .timeout_ms
            .map(|ms| Watchdog::start(ctx.interrupt_handle(), Duration::from_millis(ms)));

        let result = ctx
            .compile_script(&name, &source)
            .and_then(|script| ctx.execute_script(&script));

        let timed_out = watchdog.is_some_and(Watchdog::finish);
        match result {
            Ok(value) if value.is_undefined() => Ok(None),
            Ok(value) => Ok(Some(value.to_string())),
            Err(_) if timed_out => Err(anyhow!(
                "{} timed out after {}ms",
                self.entry.display(),
                self.timeout_ms.unwrap_or_default()
            )),
            Err(e) => Err(anyhow!("{:#}", e)),
        }
    }
}

/// Interrupts a context unless finished before its deadline
struct Watchdog {
    done: crossbeam_channel::Sender<()>,
    thread: thread::JoinHandle<bool>,
}

impl Watchdog {
    fn start(handle: InterruptHandle, timeout: Duration) -> Self {
        let (done, finished) = bounded::<()>(1);
        let thread = thread::spawn(move || {
            select! {
                recv(finished) -> _ => false,
                default(timeout) => {
                    warn!(context_ref = handle.context_ref(), ?timeout, "script timed out");
                    handle.request_interrupt();
                    true
                }
            }
        });
        debug!(?timeout, "watchdog started");
        Self { done, thread }
    }

    /// Stop the watchdog; true if it interrupted the context
    fn finish(self) -> bool {
        let _ = self.done.send(());
        self.thread.join().unwrap_or(false)
    }
}
