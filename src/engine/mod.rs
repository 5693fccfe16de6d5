pub mod cache;
pub mod context;
pub mod dispatch;
pub mod dom;
pub mod editor;
pub mod panel;
pub mod rank;
pub mod surface;
pub mod trigger;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::{KeyOutcome, Notice, NoticeKind, PointerHit, RecallContext};
pub use dom::{Document, NodeId};
pub use panel::{Key, PanelRow, SuggestionPanel};
pub use surface::{EditableSurface, Surface};
