//! Slide navigation commands pushed by the server, and the presentation
//! options handed to the slideshow on startup.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChannelError, Result};
use crate::socket::Incoming;

/// Server event: advance one slide.
pub const EVENT_NEXT_SLIDE: &str = "next-slide";
/// Server event: go back one slide.
pub const EVENT_PREVIOUS_SLIDE: &str = "previous-slide";
/// Server event: jump to `{"slide": n}`.
pub const EVENT_GO_TO_SLIDE: &str = "go-to-slide";

/// A navigation command for the presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideCommand {
    Next,
    Previous,
    GoTo(u32),
}

/// The slideshow being driven.
pub trait Presenter {
    fn next(&mut self);
    fn previous(&mut self);
    fn goto(&mut self, index: u32);
}

impl SlideCommand {
    /// Parse a server event. Events that are not slide commands yield `None`.
    pub fn from_event(event: &str, payload: &Value) -> Result<Option<Self>> {
        match event {
            EVENT_NEXT_SLIDE => Ok(Some(SlideCommand::Next)),
            EVENT_PREVIOUS_SLIDE => Ok(Some(SlideCommand::Previous)),
            EVENT_GO_TO_SLIDE => {
                let slide = payload
                    .get("slide")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| invalid(event, "missing non-negative integer 'slide'"))?;
                let slide = u32::try_from(slide).map_err(|_| invalid(event, "slide out of range"))?;
                Ok(Some(SlideCommand::GoTo(slide)))
            }
            _ => Ok(None),
        }
    }

    /// Parse an [`Incoming`] server event.
    pub fn from_incoming(incoming: &Incoming) -> Result<Option<Self>> {
        Self::from_event(&incoming.event, &incoming.payload)
    }

    /// Apply the command to a presenter.
    pub fn apply<P: Presenter + ?Sized>(self, presenter: &mut P) {
        match self {
            SlideCommand::Next => presenter.next(),
            SlideCommand::Previous => presenter.previous(),
            SlideCommand::GoTo(index) => presenter.goto(index),
        }
    }
}

fn invalid(event: &str, reason: &str) -> ChannelError {
    ChannelError::InvalidEvent {
        event: event.to_string(),
        reason: reason.to_string(),
    }
}

/// Options passed to the slideshow's initialize call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PresentationConfig {
    /// Reflect the current slide in the URL fragment.
    pub hash: bool,
    pub center: bool,
    /// Render inside a page element instead of full window.
    pub embedded: bool,
    pub controls: bool,
    pub progress: bool,
    pub width: String,
    pub height: String,
    pub plugins: Vec<String>,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            hash: true,
            center: true,
            embedded: true,
            controls: false,
            progress: false,
            width: "100%".to_string(),
            height: "100%".to_string(),
            plugins: vec![
                "markdown".to_string(),
                "highlight".to_string(),
                "notes".to_string(),
            ],
        }
    }
}
