// THEORY:
// The `review` module is the state machine behind the interactive per-object
// walkthrough. It owns the cursor over the ordered descriptor sequence and the
// transition rules; it deliberately owns NOTHING about windows, key codes, or
// files. The `visual_inspector` front-end blocks on one operator key per
// iteration, maps it to a `ReviewCommand`, and performs the side effects the
// session asks for (drawing the object mask, appending to the report).
//
// Keeping the machine pure keeps the whole blocking loop testable without a
// display: the tests below drive it with scripted command sequences.
//
// The module also carries the display-centering geometry. The original chain
// hardcoded a monitor index; here the target surface is an explicit
// `DisplayTarget` parameter handed in by the caller.

use crate::core_modules::region::RegionDescriptor;

/// One discrete operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewCommand {
    /// Advance to the next object; past the last object the session finishes.
    Next,
    /// Step back one object, never below the first.
    Previous,
    /// Ask the caller to append the current descriptor to the report.
    Save,
    /// Finish immediately, wherever the cursor is.
    Quit,
}

/// What the caller should do after applying a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStep {
    /// Render the (possibly new) current object and wait for the next input.
    Continue,
    /// Append the current descriptor to the report, then continue.
    SaveRequested,
    /// The session is over; tear down any windows.
    Finished,
}

/// Cursor over the ordered descriptor sequence.
pub struct ReviewSession<'a> {
    descriptors: &'a [RegionDescriptor],
    index: usize,
    finished: bool,
}

impl<'a> ReviewSession<'a> {
    /// Starts at the first object. An empty sequence is already finished.
    pub fn new(descriptors: &'a [RegionDescriptor]) -> Self {
        Self {
            descriptors,
            index: 0,
            finished: descriptors.is_empty(),
        }
    }

    /// The descriptor under the cursor, or `None` once finished.
    pub fn current(&self) -> Option<&'a RegionDescriptor> {
        if self.finished {
            None
        } else {
            self.descriptors.get(self.index)
        }
    }

    /// Zero-based cursor position.
    pub fn position(&self) -> usize {
        self.index
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Applies one operator command and reports the follow-up action.
    pub fn apply(&mut self, command: ReviewCommand) -> ReviewStep {
        if self.finished {
            return ReviewStep::Finished;
        }
        match command {
            ReviewCommand::Next => {
                self.index += 1;
                if self.index >= self.descriptors.len() {
                    self.finished = true;
                    return ReviewStep::Finished;
                }
                ReviewStep::Continue
            }
            ReviewCommand::Previous => {
                self.index = self.index.saturating_sub(1);
                ReviewStep::Continue
            }
            ReviewCommand::Save => ReviewStep::SaveRequested,
            ReviewCommand::Quit => {
                self.finished = true;
                ReviewStep::Finished
            }
        }
    }
}

/// The display surface review windows are centered on. Passed in explicitly
/// by the caller instead of being looked up from a hardcoded monitor index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayTarget {
    pub width: u32,
    pub height: u32,
}

impl DisplayTarget {
    /// Top-left corner that centers a `window_width` x `window_height` window
    /// on this surface. Windows larger than the surface get a negative origin,
    /// which windowing back-ends accept.
    pub fn centered_origin(&self, window_width: u32, window_height: u32) -> (i32, i32) {
        let x = self.width as i32 / 2 - window_width as i32 / 2;
        let y = self.height as i32 / 2 - window_height as i32 / 2;
        (x, y)
    }
}
