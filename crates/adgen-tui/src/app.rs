use crate::tui::AppEvent;
use adgen_core::{
    AssetRef, ChatRole, Conversation, EndReason, SideChannelState, StreamEvent, TurnController,
    TurnHandle, TurnId, TurnOutcome, TurnSeed, TurnState,
};
use ratatui::layout::Rect;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Chat,
    Campaign,
    Input,
}

impl FocusPane {
    pub fn next(self) -> Self {
        match self {
            FocusPane::Chat => FocusPane::Campaign,
            FocusPane::Campaign => FocusPane::Input,
            FocusPane::Input => FocusPane::Chat,
        }
    }
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Turn state
    pub conversation: Conversation,
    pub side_channel: SideChannelState,
    pub controller: TurnController,
    pub events: mpsc::UnboundedSender<AppEvent>,
    pub turn_task: Option<JoinHandle<()>>,

    // Input box
    pub query_input: String,
    pub query_cursor: usize, // cursor position in query_input, in chars

    // Chat pane
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height, for scroll calculations
    pub chat_width: u16,  // inner width, for wrap calculations
    pub campaign_scroll: u16,

    // Areas for mouse hit-testing
    pub chat_area: Option<Rect>,
    pub campaign_area: Option<Rect>,

    pub animation_frame: u8, // 0-2 for ellipsis animation
    pub status: Option<String>,
}

impl App {
    pub fn new(controller: TurnController, events: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::Input,
            conversation: Conversation::new(),
            side_channel: SideChannelState::new(),
            controller,
            events,
            turn_task: None,
            query_input: String::new(),
            query_cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            campaign_scroll: 0,
            chat_area: None,
            campaign_area: None,
            animation_frame: 0,
            status: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        self.controller.client().endpoint()
    }

    pub fn is_busy(&self) -> bool {
        self.conversation.state().is_open()
    }

    /// Kick off the first turn from a hand-off seed, if it carries a message.
    pub fn start_seeded(&mut self, seed: &TurnSeed) {
        if let Some(update) = seed.side_channel() {
            self.side_channel.apply(update);
        }
        match self.conversation.begin_seeded(seed) {
            Ok(Some(handle)) => self.launch(handle),
            Ok(None) => {}
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    /// Send whatever is in the input box as a new turn.
    pub fn submit(&mut self) {
        match self.conversation.begin_turn(&self.query_input, None) {
            Ok(handle) => {
                self.query_input.clear();
                self.query_cursor = 0;
                self.status = None;
                self.launch(handle);
            }
            Err(err) => self.status = Some(err.to_string()),
        }
    }

    fn launch(&mut self, handle: TurnHandle) {
        self.turn_task = Some(self.controller.spawn(&handle, self.events.clone(), AppEvent::Turn));
        self.scroll_chat_to_bottom();
    }

    /// Route one stream event through the conversation and apply any
    /// side-channel changes it produced.
    pub fn apply_turn_event(&mut self, turn: TurnId, event: StreamEvent) {
        let step = self.conversation.handle(turn, event);
        if let Some(update) = step.side_channel {
            self.side_channel.apply(update);
        }
        if let Some(outcome) = step.outcome {
            self.finish_turn(&outcome);
        }
        self.scroll_chat_to_bottom();
    }

    fn finish_turn(&mut self, outcome: &TurnOutcome) {
        // The pump stops on its own once it has delivered an end event or
        // sees the turn's token cancelled.
        self.turn_task = None;
        self.status = match &outcome.reason {
            EndReason::ResponseComplete | EndReason::StreamClosed => None,
            EndReason::Cancelled => Some("Cancelled".to_string()),
            EndReason::ErrorRecord(_) | EndReason::TransportFailed(_) => {
                Some(format!("Turn {}", outcome.state))
            }
        };
    }

    pub fn cancel_turn(&mut self) {
        if self.conversation.cancel() {
            self.status = Some("Cancelling...".to_string());
        }
    }

    pub fn quit(&mut self) {
        self.conversation.cancel();
        if let Some(task) = self.turn_task.take() {
            task.abort();
        }
        self.should_quit = true;
    }

    pub fn current_image(&self) -> Option<&AssetRef> {
        self.side_channel.image.as_ref()
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.conversation.state() == TurnState::AwaitingFirstToken
            || self
                .conversation
                .placeholder()
                .map(|m| m.image_loading)
                .unwrap_or(false)
        {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_chat_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_chat_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }

    /// Scroll chat to bottom so the newest reply is visible
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for msg in self.conversation.transcript() {
            total_lines = total_lines.saturating_add(1); // Role line
            let body = if msg.role == ChatRole::Assistant && msg.content.is_empty() {
                "Thinking..."
            } else {
                msg.content.as_str()
            };
            for line in body.lines() {
                let char_count = line.chars().count();
                let wrapped = if char_count == 0 {
                    1
                } else {
                    char_count / wrap_width + 1
                };
                total_lines = total_lines.saturating_add(wrapped as u16);
            }
            if msg.image_ref.is_some() || msg.image_loading {
                total_lines = total_lines.saturating_add(1);
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }
}
