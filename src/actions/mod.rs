//! Actions module: directive parsing and execution.

mod directive;
mod handler;

pub use directive::{
    ActionDirective, ActionKind, DirectiveError, LaunchTarget, Point, SwipeDirection, SwipeGesture,
};
pub use handler::{search_installed, to_pixel, ActionConfig, ActionHandler, ActionOutcome, COORDINATE_MAX};
