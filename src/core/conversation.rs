//! Conversation state machine - Per-user purchase and lookup dialogues.
//!
//! [`transition`] is a pure `(state, event) -> (next state, action)` table with no I/O.
//! The dispatcher applies the returned state and performs the action; anything a
//! state does not accept re-prompts that state without moving.

use crate::core::replies::labels;

/// Where a user is in a dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    /// No dialogue in progress
    #[default]
    Idle,
    /// Waiting for a lookup query
    AwaitingQuery,
    /// Waiting for the paid amount
    AmountEntry,
    /// Waiting for the amount to be confirmed
    AmountConfirm,
    /// Waiting for a screenshot upload
    ScreenshotWait,
    /// Waiting for the screenshot to be confirmed
    ScreenshotConfirm,
    /// Waiting for the transaction reference
    ReferenceEntry,
    /// Waiting for the reference to be confirmed
    ReferenceConfirm,
}

/// Step plus whatever the purchase dialogue has collected so far.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConversationState {
    /// Current step
    pub step: Step,
    /// Claimed amount
    pub amount: Option<f64>,
    /// Uploaded screenshot reference
    pub screenshot: Option<String>,
    /// Transaction reference
    pub reference: Option<String>,
}

impl ConversationState {
    /// Whether a dialogue is in progress
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.step == Step::Idle
    }

    fn at(&self, step: Step) -> Self {
        Self {
            step,
            ..self.clone()
        }
    }
}

/// Button presses that steer a dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Begin the purchase submission
    StartPurchase,
    /// Begin a lookup
    StartLookup,
    /// Accept the value shown
    Confirm,
    /// Re-enter the value shown
    Change,
    /// Replace the screenshot
    Reupload,
    /// Abandon the dialogue
    Back,
}

/// One inbound user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Free text
    Text(String),
    /// An uploaded image, by transport reference
    Photo(String),
    /// A recognised button
    Control(Control),
}

impl Event {
    /// Classifies a text message: known button labels become controls.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        let control = match trimmed {
            labels::PAYMENT_DONE => Control::StartPurchase,
            labels::LOOKUP => Control::StartLookup,
            labels::CONFIRM_AMOUNT | labels::CONFIRM_SCREENSHOT | labels::CONFIRM_REFERENCE => {
                Control::Confirm
            }
            labels::CHANGE_AMOUNT | labels::CHANGE_REFERENCE => Control::Change,
            labels::REUPLOAD_SCREENSHOT => Control::Reupload,
            labels::BACK => Control::Back,
            _ => return Self::Text(trimmed.to_string()),
        };
        Self::Control(control)
    }
}

/// Prompts the dispatcher renders after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    /// Ask for the paid amount
    AskAmount,
    /// Ask for a replacement amount
    ChangeAmount,
    /// Amount did not parse or was not positive
    InvalidAmount,
    /// Show the amount for confirmation
    ConfirmAmount {
        /// Parsed amount
        amount: f64,
    },
    /// Ask for a screenshot
    AskScreenshot,
    /// Text arrived where a photo was needed
    ScreenshotRequired,
    /// Show that the screenshot arrived
    ConfirmScreenshot,
    /// Ask for the transaction reference
    AskReference,
    /// Reference too short
    InvalidReference {
        /// Shortest accepted length
        min_len: usize,
    },
    /// Show the reference for confirmation
    ConfirmReference {
        /// Entered reference
        reference: String,
    },
    /// Ask for a lookup query
    AskQuery,
    /// Query was empty
    InvalidQuery,
    /// Dialogue abandoned
    BackToMenu,
}

/// Everything a confirmed purchase submission carries.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDraft {
    /// Claimed amount
    pub amount: f64,
    /// Transaction reference
    pub reference: String,
    /// Screenshot reference
    pub screenshot: String,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Show a prompt
    Prompt(Prompt),
    /// Start a lookup if the balance covers one; otherwise stay idle
    BeginLookup,
    /// Run a lookup for `query`
    Lookup {
        /// Normalised query
        query: String,
    },
    /// Append a payment record
    Submit(PaymentDraft),
    /// Not part of any dialogue; the dispatcher handles it as a menu input
    Unhandled,
}

/// New state plus the action to perform.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// State to store once the action succeeds
    pub next: ConversationState,
    /// What to do
    pub action: Action,
}

impl Transition {
    fn prompt(next: ConversationState, prompt: Prompt) -> Self {
        Self {
            next,
            action: Action::Prompt(prompt),
        }
    }
}

/// Tunables for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowRules {
    /// Shortest accepted transaction reference
    pub min_reference_len: usize,
}

impl Default for FlowRules {
    fn default() -> Self {
        Self {
            min_reference_len: 4,
        }
    }
}

/// Parses a claimed amount after stripping currency markers.
#[must_use]
pub fn parse_amount(text: &str) -> Option<f64> {
    let lowered = text.trim().to_lowercase();
    let stripped: String = lowered
        .replace("inr", "")
        .replace("rs.", "")
        .replace("rs", "")
        .chars()
        .filter(|c| !matches!(c, '₹' | '$' | '€' | '£' | ',') && !c.is_whitespace())
        .collect();
    if stripped.is_empty() || !stripped.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    stripped
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite() && *amount > 0.0)
}

/// Upper-cases a lookup query and drops whitespace.
#[must_use]
pub fn normalize_query(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// The prompt that re-asks for the input `step` expects.
#[must_use]
pub fn reprompt(state: &ConversationState) -> Prompt {
    match state.step {
        Step::Idle => Prompt::BackToMenu,
        Step::AwaitingQuery => Prompt::AskQuery,
        Step::AmountEntry => Prompt::AskAmount,
        Step::AmountConfirm => Prompt::ConfirmAmount {
            amount: state.amount.unwrap_or_default(),
        },
        Step::ScreenshotWait => Prompt::ScreenshotRequired,
        Step::ScreenshotConfirm => Prompt::ConfirmScreenshot,
        Step::ReferenceEntry => Prompt::AskReference,
        Step::ReferenceConfirm => Prompt::ConfirmReference {
            reference: state.reference.clone().unwrap_or_default(),
        },
    }
}

/// The transition table.
#[must_use]
pub fn transition(state: &ConversationState, event: &Event, rules: &FlowRules) -> Transition {
    use Control::{Back, Change, Confirm, Reupload, StartLookup, StartPurchase};
    use Event::{Control as Ctl, Photo, Text};

    match (state.step, event) {
        (_, Ctl(Back)) => Transition::prompt(ConversationState::default(), Prompt::BackToMenu),

        (Step::Idle, Ctl(StartPurchase)) => Transition::prompt(
            ConversationState::default().at(Step::AmountEntry),
            Prompt::AskAmount,
        ),
        (Step::Idle, Ctl(StartLookup)) => Transition {
            next: ConversationState::default().at(Step::AwaitingQuery),
            action: Action::BeginLookup,
        },
        (Step::Idle, _) => Transition {
            next: state.clone(),
            action: Action::Unhandled,
        },

        (Step::AwaitingQuery, Text(text)) => {
            let query = normalize_query(text);
            if query.is_empty() {
                Transition::prompt(state.clone(), Prompt::InvalidQuery)
            } else {
                Transition {
                    next: ConversationState::default(),
                    action: Action::Lookup { query },
                }
            }
        }

        (Step::AmountEntry, Text(text)) => match parse_amount(text) {
            Some(amount) => Transition::prompt(
                ConversationState {
                    amount: Some(amount),
                    ..state.at(Step::AmountConfirm)
                },
                Prompt::ConfirmAmount { amount },
            ),
            None => Transition::prompt(state.clone(), Prompt::InvalidAmount),
        },
        (Step::AmountConfirm, Ctl(Confirm)) => {
            Transition::prompt(state.at(Step::ScreenshotWait), Prompt::AskScreenshot)
        }
        (Step::AmountConfirm, Ctl(Change)) => {
            Transition::prompt(state.at(Step::AmountEntry), Prompt::ChangeAmount)
        }

        (Step::ScreenshotWait | Step::ScreenshotConfirm, Photo(image_ref)) => Transition::prompt(
            ConversationState {
                screenshot: Some(image_ref.clone()),
                ..state.at(Step::ScreenshotConfirm)
            },
            Prompt::ConfirmScreenshot,
        ),
        (Step::ScreenshotWait | Step::ScreenshotConfirm, Ctl(Reupload)) => Transition::prompt(
            ConversationState {
                screenshot: None,
                ..state.at(Step::ScreenshotWait)
            },
            Prompt::AskScreenshot,
        ),
        (Step::ScreenshotConfirm, Ctl(Confirm)) => {
            Transition::prompt(state.at(Step::ReferenceEntry), Prompt::AskReference)
        }

        (Step::ReferenceEntry, Text(text)) => {
            let reference = text.trim();
            if reference.chars().count() < rules.min_reference_len {
                Transition::prompt(
                    state.clone(),
                    Prompt::InvalidReference {
                        min_len: rules.min_reference_len,
                    },
                )
            } else {
                Transition::prompt(
                    ConversationState {
                        reference: Some(reference.to_string()),
                        ..state.at(Step::ReferenceConfirm)
                    },
                    Prompt::ConfirmReference {
                        reference: reference.to_string(),
                    },
                )
            }
        }
        (Step::ReferenceConfirm, Ctl(Change)) => {
            Transition::prompt(state.at(Step::ReferenceEntry), Prompt::AskReference)
        }
        (Step::ReferenceConfirm, Ctl(Confirm)) => match draft(state) {
            Some(draft) => Transition {
                next: ConversationState::default(),
                action: Action::Submit(draft),
            },
            // Collected fields went missing; start the purchase over
            None => Transition::prompt(
                ConversationState::default().at(Step::AmountEntry),
                Prompt::AskAmount,
            ),
        },

        _ => Transition::prompt(state.clone(), reprompt(state)),
    }
}

fn draft(state: &ConversationState) -> Option<PaymentDraft> {
    Some(PaymentDraft {
        amount: state.amount?,
        reference: state.reference.clone()?,
        screenshot: state.screenshot.clone()?,
    })
}
