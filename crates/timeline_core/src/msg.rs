use crate::{InterceptedResponse, Millis};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Collection begins.
    Start { at: Millis },
    /// The interception channel observed a response.
    Response {
        response: InterceptedResponse,
        at: Millis,
    },
    /// The page performed one scroll/pagination step.
    Scrolled { at: Millis },
    /// A cooldown requested through `Effect::BeginCooldown` has run out.
    CooldownElapsed { at: Millis },
    /// User resumed after a rate-limit or auth pause.
    ManualResume { at: Millis },
    /// Caller-driven poll for the completion heuristic.
    IdleCheck { now: Millis, height_stable: bool },
    /// User confirmed that collection is finished.
    ConfirmDone { at: Millis },
    /// The final export was written.
    ExportWritten { at: Millis },
    /// User cancelled the session.
    Cancel { at: Millis },
}
