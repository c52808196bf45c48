//! Single-callback event system, kept alongside [`crate::bus`] for the
//! narrower case of embedding this crate as a library node in a larger
//! program: one [`EventHandler`] per embedder, no topic fan-out, no
//! broadcast channel. [`crate::bus::EventBus`] serves the live multi-pane
//! display and the Task Tracker instead.

/// Events emitted during a single call's execution.
#[derive(Debug, Clone)]
pub enum Event {
    /// A call has started executing.
    PayloadStart {
        /// Instance name of the call.
        name: String,
        /// Stable type identifier (e.g. `"agent-worker"`, `"router"`).
        kind: &'static str,
    },
    /// A token was received during streaming.
    Token {
        /// Instance name of the call producing this token.
        name: String,
        /// The token text.
        chunk: String,
    },
    /// A call has finished executing.
    PayloadEnd {
        /// Instance name of the call.
        name: String,
        /// Whether execution succeeded.
        ok: bool,
    },
    /// A semantic retry attempt is starting.
    RetryStart {
        /// Instance name of the call being retried.
        name: String,
        /// The retry attempt number (1-indexed).
        attempt: u32,
        /// Why the retry was triggered (parse error or validator message).
        reason: String,
    },
    /// A semantic retry sequence has completed.
    RetryEnd {
        /// Instance name of the call.
        name: String,
        /// Total number of retry attempts made.
        attempts: u32,
        /// Whether the final attempt succeeded.
        success: bool,
    },
    /// A partial parse result from streaming JSON.
    PartialParse {
        /// Instance name of the call.
        name: String,
        /// The partial JSON value extracted so far.
        value: serde_json::Value,
        /// Whether the JSON appears complete (all brackets closed).
        complete: bool,
    },
    /// A transport-level retry due to HTTP error.
    TransportRetry {
        /// Instance name or operation description.
        name: String,
        /// The retry attempt number (1-indexed).
        attempt: u32,
        /// Delay before this retry attempt in milliseconds.
        delay_ms: u64,
        /// Reason for the retry (error description).
        reason: String,
    },
}

/// Handler for call lifecycle events.
///
/// Implement this trait to receive streaming tokens, progress updates,
/// and other lifecycle signals during a call's execution.
///
/// This is entirely optional -- calls work without an event handler.
///
/// # Example
///
/// ```
/// use multi_agent_coder::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::Token { chunk, .. } => print!("{}", chunk),
///             Event::PayloadStart { name, .. } => println!("[start] {}", name),
///             Event::PayloadEnd { name, ok, .. } => println!("[end] {} ok={}", name, ok),
///             _ => {} // RetryStart, RetryEnd, PartialParse, TransportRetry
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called when a call emits an event.
    fn on_event(&self, event: Event);
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use multi_agent_coder::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::Token { chunk, .. } = event {
///         print!("{}", chunk);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}
