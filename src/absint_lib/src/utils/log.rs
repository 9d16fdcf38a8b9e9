//! Structs and functions for generating and collecting log messages.

use crate::prelude::*;
use std::collections::BTreeMap;
use std::thread::JoinHandle;

/// A generic log message.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct LogMessage {
    /// The log message.
    pub text: String,
    /// The severity/type of the log message.
    pub level: LogLevel,
    /// The location inside the program that the message is related to.
    pub location: Option<CodeLocation>,
    /// The analysis where the message originated.
    pub source: Option<String>,
}

impl LogMessage {
    /// Create a new `Info`-level log message.
    pub fn new_info(text: impl Into<String>) -> LogMessage {
        LogMessage {
            text: text.into(),
            level: LogLevel::Info,
            location: None,
            source: None,
        }
    }

    /// Create a new `Debug`-level log message.
    pub fn new_debug(text: impl Into<String>) -> LogMessage {
        LogMessage {
            text: text.into(),
            level: LogLevel::Debug,
            location: None,
            source: None,
        }
    }

    /// Create a new `Error`-level log message.
    pub fn new_error(text: impl Into<String>) -> LogMessage {
        LogMessage {
            text: text.into(),
            level: LogLevel::Error,
            location: None,
            source: None,
        }
    }

    /// Associate a specific location to the log message.
    pub fn location(mut self, location: CodeLocation) -> LogMessage {
        self.location = Some(location);
        self
    }

    /// Set the name of the source analysis for the log message.
    pub fn source(mut self, source: impl Into<String>) -> LogMessage {
        self.source = Some(source.into());
        self
    }
}

/// The severity/type of a log message.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum LogLevel {
    /// Messages intended for debugging.
    Debug,
    /// Errors encountered during analysis.
    Error,
    /// Non-error messages intended for the user.
    Info,
}

impl std::fmt::Display for LogMessage {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.level {
            LogLevel::Debug => write!(formatter, "DEBUG: ")?,
            LogLevel::Error => write!(formatter, "ERROR: ")?,
            LogLevel::Info => write!(formatter, "INFO: ")?,
        };
        match (&self.source, &self.location) {
            (Some(source), Some(location)) => write!(formatter, "{source} @ {location}: ")?,
            (Some(source), None) => write!(formatter, "{source}: ")?,
            (None, Some(location)) => write!(formatter, "{location}: ")?,
            (None, None) => (),
        };
        write!(formatter, "{}", self.text)
    }
}

/// The message types a logging thread can receive.
/// See the [`LogThread`] type for more information.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub enum LogThreadMsg {
    /// A normal log message.
    Log(LogMessage),
    /// If the log collector thread receives this signal,
    /// it should stop receiving new messages
    /// and instead terminate and return the collected messages prior to
    /// receiving the termination signal.
    Terminate,
}

impl From<LogMessage> for LogThreadMsg {
    fn from(msg: LogMessage) -> Self {
        Self::Log(msg)
    }
}

/// A type for managing threads for collecting log messages.
///
/// With [`LogThread::spawn()`] one can create a new log thread
/// whose handle is contained in the returned `LogThread` struct.
/// By calling the [`collect()`](LogThread::collect()) method
/// one can tell the log thread to shut down
/// and return the logs collected to this point.
/// If the `LogThread` object gets dropped before calling `collect()`,
/// the corresponding logging thread will be stopped
/// and all collected logs will be discarded.
///
/// If one deliberately wants to discard all logging messages,
/// one can simply create a sender to a disconnected channel
/// via [`LogThread::create_disconnected_sender()`].
pub struct LogThread {
    msg_sender: crossbeam_channel::Sender<LogThreadMsg>,
    thread_handle: Option<JoinHandle<Vec<LogMessage>>>,
}

impl Drop for LogThread {
    /// If the logging thread still exists,
    /// send it the `Terminate` signal.
    /// Then wait until the logging thread stopped.
    fn drop(&mut self) {
        let _ = self.msg_sender.send(LogThreadMsg::Terminate);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl LogThread {
    /// Create a new `LogThread` object with a handle to a freshly spawned
    /// logging collector thread.
    ///
    /// The parameter is the function containing the actual log collection
    /// logic, i.e. it should receive messages through the given receiver
    /// until the channel disconnects or until it receives a
    /// [`LogThreadMsg::Terminate`] message, and then return the logs
    /// collected up to that point.
    ///
    /// See [`LogThread::collect_and_deduplicate`] for a standard collector
    /// function that can be used here.
    pub fn spawn<F>(collector_func: F) -> LogThread
    where
        F: FnOnce(crossbeam_channel::Receiver<LogThreadMsg>) -> Vec<LogMessage> + Send + 'static,
    {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let thread_handle = std::thread::spawn(move || collector_func(receiver));
        LogThread {
            msg_sender: sender,
            thread_handle: Some(thread_handle),
        }
    }

    /// Just create a disconnected sender to a (non-existing) logging
    /// thread. Can be used like a sender to a channel that deliberately
    /// discards all messages sent to it.
    pub fn create_disconnected_sender() -> crossbeam_channel::Sender<LogThreadMsg> {
        let (sender, _) = crossbeam_channel::unbounded();
        sender
    }

    /// Get a sender that can be used to send messages to the logging
    /// thread corresponding to this `LogThread` instance.
    pub fn get_msg_sender(&self) -> crossbeam_channel::Sender<LogThreadMsg> {
        self.msg_sender.clone()
    }

    /// Stop the logging thread by sending it the `Terminate` signal and
    /// then return all logs collected until that point.
    pub fn collect(mut self) -> Vec<LogMessage> {
        let _ = self.msg_sender.send(LogThreadMsg::Terminate);
        if let Some(handle) = self.thread_handle.take() {
            handle.join().unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    /// Collect logs from the given receiver until a
    /// [`LogThreadMsg::Terminate`] signal is received.
    ///
    /// Messages with a location are deduplicated: only the last message
    /// received for an origin location is kept.
    ///
    /// This function can be used as a standard collector function for
    /// [`LogThread::spawn`].
    pub fn collect_and_deduplicate(
        receiver: crossbeam_channel::Receiver<LogThreadMsg>,
    ) -> Vec<LogMessage> {
        let mut logs_with_location = BTreeMap::new();
        let mut general_logs = Vec::new();
        while let Ok(msg) = receiver.recv() {
            match msg {
                LogThreadMsg::Log(log_message) => {
                    if let Some(ref location) = log_message.location {
                        logs_with_location.insert(location.clone(), log_message);
                    } else {
                        general_logs.push(log_message);
                    }
                }
                LogThreadMsg::Terminate => break,
            }
        }
        logs_with_location
            .into_values()
            .chain(general_logs)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_thread_collects_messages() {
        let log_thread = LogThread::spawn(LogThread::collect_and_deduplicate);
        let sender = log_thread.get_msg_sender();
        sender
            .send(LogMessage::new_info("first").source("test").into())
            .unwrap();
        sender
            .send(LogMessage::new_debug("second").into())
            .unwrap();
        let logs = log_thread.collect();
        assert_eq!(logs.len(), 2);
    }

    #[test]
    fn located_messages_deduplicate() {
        let log_thread = LogThread::spawn(LogThread::collect_and_deduplicate);
        let sender = log_thread.get_msg_sender();
        let location = CodeLocation::new("test.src", 3, 0);
        sender
            .send(
                LogMessage::new_error("stale")
                    .location(location.clone())
                    .into(),
            )
            .unwrap();
        sender
            .send(LogMessage::new_error("fresh").location(location).into())
            .unwrap();
        let logs = log_thread.collect();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].text, "fresh");
    }
}
