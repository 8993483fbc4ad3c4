//! The altitude chart: query data, presentation style and the session that draws and replays it.

pub mod query;
pub mod session;
pub mod style;
