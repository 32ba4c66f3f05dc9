//! Core module - platform-independent protocol and session logic
//!
//! Nothing here touches a socket, a thread or the wall clock. The client
//! layer feeds messages and instants in and reads state back out.

pub mod constants;
pub mod evaluator;
pub mod io_traits;
pub mod presence;
pub mod protocol;
pub mod reconnect;
pub mod schedule;
pub mod session;
pub mod timer;
pub mod types;

pub use evaluator::is_correct;
pub use io_traits::{ConnectionStatus, MessageSender};
pub use presence::{PresenceReporter, PresenceSettings};
pub use protocol::{HostMessage, OutboundEnvelope, PlayerMessage, ProtocolError};
pub use reconnect::ReconnectPolicy;
pub use session::{PlayerSession, SessionEvent, SessionSnapshot, SubmitOutcome, TimingSettings};
pub use types::{AnswerValue, GamePhase, QuestionType, SessionIdentity};
