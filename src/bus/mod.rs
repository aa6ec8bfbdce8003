// src/bus/mod.rs

//! In-process event bus for reload lifecycle notifications.
//!
//! Topics are a closed set so producers and consumers cannot disagree on
//! names or payload shapes. [`broker`] holds the broadcast plumbing.

pub mod broker;

use std::fmt;

use serde::Serialize;

pub use broker::{EventBus, Subscription};

/// Named channel on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    FrontendUpdate,
    BackendUpdate,
    AppReady,
    AppError,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::FrontendUpdate,
        Topic::BackendUpdate,
        Topic::AppReady,
        Topic::AppError,
    ];

    /// Wire name of the topic, e.g. `"app:ready"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::FrontendUpdate => "frontend:update",
            Topic::BackendUpdate => "backend:update",
            Topic::AppReady => "app:ready",
            Topic::AppError => "app:error",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Topic::FrontendUpdate => 0,
            Topic::BackendUpdate => 1,
            Topic::AppReady => 2,
            Topic::AppError => 3,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message published on the bus. Each variant belongs to exactly one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "topic")]
pub enum Message {
    #[serde(rename = "frontend:update")]
    FrontendUpdate,
    #[serde(rename = "backend:update")]
    BackendUpdate,
    #[serde(rename = "app:ready")]
    AppReady,
    #[serde(rename = "app:error")]
    AppError { message: String },
}

impl Message {
    pub fn app_error(message: impl Into<String>) -> Self {
        Message::AppError {
            message: message.into(),
        }
    }

    pub fn topic(&self) -> Topic {
        match self {
            Message::FrontendUpdate => Topic::FrontendUpdate,
            Message::BackendUpdate => Topic::BackendUpdate,
            Message::AppReady => Topic::AppReady,
            Message::AppError { .. } => Topic::AppError,
        }
    }

    /// Single-line JSON encoding used by the control stream.
    pub fn to_json_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| {
            format!("{{\"topic\":\"{}\"}}", self.topic())
        });
        line.push('\n');
        line
    }
}
