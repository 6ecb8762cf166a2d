//! Console spinner shown while a chunk is being synthesized.
//!
//! The spinner runs as its own task and redraws on a fixed tick until its
//! stop flag is set. It shares nothing else with the synthesis call.

use indicatif::{ProgressBar, ProgressStyle};
use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

const TICK: Duration = Duration::from_millis(100);

/// Braille frames, followed by the finished frame.
const BRAILLE_TICKS: &[&str] = &["⡿", "⣟", "⣯", "⣷", "⣾", "⣽", "⣻", "⢿", "✓"];

pub struct Spinner {
    bar: ProgressBar,
    stop: Arc<AtomicBool>,
    ticker: Option<JoinHandle<()>>,
}

impl Spinner {
    /// Start spinning with `message`. Must be called inside a tokio runtime.
    pub fn start(message: impl Into<Cow<'static, str>>) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(BRAILLE_TICKS),
        );
        bar.set_message(message);
        Self::spawn(bar)
    }

    /// A spinner that draws nothing.
    pub fn hidden() -> Self {
        Self::spawn(ProgressBar::hidden())
    }

    fn spawn(bar: ProgressBar) -> Self {
        let stop = Arc::new(AtomicBool::new(false));

        let ticker = {
            let bar = bar.clone();
            let stop = Arc::clone(&stop);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(TICK);
                while !stop.load(Ordering::Relaxed) {
                    interval.tick().await;
                    bar.tick();
                }
            })
        };

        Self {
            bar,
            stop,
            ticker: Some(ticker),
        }
    }

    /// Stop the ticker and leave `message` on the line.
    pub async fn finish(mut self, message: impl Into<Cow<'static, str>>) {
        self.halt().await;
        self.bar.finish_with_message(message);
    }

    /// Stop the ticker and erase the line.
    pub async fn clear(mut self) {
        self.halt().await;
        self.bar.finish_and_clear();
    }

    async fn halt(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.await;
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        // The ticker exits on its next tick
        self.stop.store(true, Ordering::Relaxed);
        if self.ticker.is_some() {
            self.bar.abandon();
        }
    }
}
