pub mod codec;
pub mod compose;
pub mod ledger;
pub mod session;
pub mod transcript;
pub mod view;

pub use compose::{OutboundChannel, SubmitOutcome};
pub use session::ChatSession;
pub use transcript::{Side, Transcript};
