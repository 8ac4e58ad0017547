//! `requestAnimationFrame` / `setTimeout` scheduler for the scan loop.

use std::cell::RefCell;
use std::rc::Weak;

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::Window;

use super::BrowserSession;
use crate::error::ScheduleError;
use crate::schedule::{Delay, Scheduler, Ticket};

/// Re-enters the session from a one-shot JS callback. Holds only a weak
/// reference, so a dropped scanner ends its loop.
pub struct FrameScheduler {
    window: Window,
    session: Weak<RefCell<BrowserSession>>,
}

impl FrameScheduler {
    pub fn new(window: Window, session: Weak<RefCell<BrowserSession>>) -> Self {
        Self { window, session }
    }
}

impl Scheduler for FrameScheduler {
    fn schedule(&mut self, delay: Delay, ticket: Ticket) -> Result<(), ScheduleError> {
        let session = self.session.clone();
        let callback = Closure::once_into_js(move || {
            if let Some(session) = session.upgrade() {
                session.borrow_mut().scan_frame(ticket);
            }
        });

        let armed = match delay {
            Delay::NextFrame => self
                .window
                .request_animation_frame(callback.unchecked_ref())
                .map(drop),
            Delay::After(wait) => {
                let millis = i32::try_from(wait.as_millis()).unwrap_or(i32::MAX);
                self.window
                    .set_timeout_with_callback_and_timeout_and_arguments_0(
                        callback.unchecked_ref(),
                        millis,
                    )
                    .map(drop)
            }
        };
        armed.map_err(|err| ScheduleError(err.as_string().unwrap_or_else(|| format!("{:?}", err))))
    }
}
