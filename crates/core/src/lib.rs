pub mod catalog;
pub mod decision;
pub mod finalize;
pub mod flow;
pub mod gateway;
pub mod record;
pub mod session;

/// A single element of a voice response, in the order it should be rendered.
///
/// This enum is the primary API for decoupling the call-flow logic from the
/// runtime's rendering of gateway markup: the core decides *what* to say and
/// where the conversation goes next, the service layer decides how that is
/// expressed on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceAction {
    /// Speak the given text to the caller.
    Say(String),
    /// Pause for the given number of seconds before the next action.
    Pause(u32),
    /// Speak a prompt, then listen for the caller's answer. The next webhook
    /// callback will carry `next_step` as its position in the dialogue.
    Gather { prompt: String, next_step: u32 },
    /// Terminate the call.
    Hangup,
}

/// An ordered sequence of voice actions forming one complete response
/// document. Every webhook callback is answered with exactly one directive.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceDirective {
    pub actions: Vec<VoiceAction>,
}

impl VoiceDirective {
    pub fn new(actions: Vec<VoiceAction>) -> Self {
        Self { actions }
    }

    /// Speak `text`, then hang up. The shape of every terminal response.
    pub fn say_then_hangup(text: impl Into<String>) -> Self {
        Self::new(vec![VoiceAction::Say(text.into()), VoiceAction::Hangup])
    }

    /// True if the directive ends the call rather than listening for more.
    pub fn is_terminal(&self) -> bool {
        self.actions
            .last()
            .is_some_and(|a| matches!(a, VoiceAction::Hangup))
    }
}
