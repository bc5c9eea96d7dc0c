//! The dial pad driver.
//!
//! All keys share one line: a touched key closes the resistor ladder at a tap that is unique
//! to it. While idle, the line only watches for a falling edge. Once touched, the ladder is
//! powered and the line is sampled by the ADC, a few readings per voting cycle, until a cycle
//! resolves to the line being at rest again.
//!
//! ```text
//!            edge                  quota not reached
//!   Idle ─────────────▶ Sampling ─────────────────────▶ DebounceWait
//!    ▲                   │  ▲  ▲                              │
//!    │  resolved None    │  │  └──────────────────────────────┘
//!    └───────────────────┘  │
//!                        │  │ recheck
//!      resolved a key    ▼  │
//!                    RecheckWait
//! ```

use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::{Rc, Weak};
use std::time::Duration;
use log::{debug, trace, warn};
use thiserror::Error;
use crate::adc::{AdcConfig, AdcDriver};
use crate::debounce::VoteAccumulator;
use crate::keypad::{ConfigError, DialPadConfig, Key, RangeTable};
use crate::sched::{Scheduler, TaskHandle};
use crate::{GpioError, GpioInterrupt, GpioPin, GpioResult, IrqHandler};

/// The shared pad line, which is both an analog input and an edge interrupt source.
pub struct PadLine {
    pub adc: Box<dyn AdcDriver>,
    pub irq: Box<dyn GpioInterrupt>,
}

/// The phase the pad is in.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PadState {
    /// Waiting for the line's falling edge, with the ladder unpowered.
    Idle,
    /// A conversion is in flight.
    Sampling,
    /// Waiting before the next reading of the current voting cycle.
    DebounceWait,
    /// A key is down; waiting before the next voting cycle checks for its release.
    RecheckWait,
}

/// A change reported to the listeners.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KeyEvent {
    Pressed(Key),
    Released(Key),
    Hold(Key),
}

impl KeyEvent {
    pub fn key(&self) -> Key {
        match self {
            KeyEvent::Pressed(key) | KeyEvent::Released(key) | KeyEvent::Hold(key) => *key,
        }
    }

    pub fn slot(&self) -> ListenerSlot {
        match self {
            KeyEvent::Pressed(_) => ListenerSlot::Pressed,
            KeyEvent::Released(_) => ListenerSlot::Released,
            KeyEvent::Hold(_) => ListenerSlot::Hold,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ListenerSlot {
    Pressed,
    Released,
    Hold,
}

impl ListenerSlot {
    fn index(self) -> usize {
        self as usize
    }
}

pub type Listener = Box<dyn FnMut(Key)>;

#[derive(Default)]
struct Listeners {
    slots: [Option<Listener>; 3],
    /// Bumped on every registration, so a listener taken out for a call is not put back
    /// over one registered during that call.
    revisions: [u32; 3],
}

impl Listeners {
    fn set(&mut self, slot: ListenerSlot, listener: Option<Listener>) {
        self.slots[slot.index()] = listener;
        self.revisions[slot.index()] = self.revisions[slot.index()].wrapping_add(1);
    }

    fn is_set(&self, slot: ListenerSlot) -> bool {
        self.slots[slot.index()].is_some()
    }
}

#[derive(Debug, Error)]
pub enum DialPadError {
    #[error(transparent)]
    Gpio(#[from] GpioError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

struct Machine {
    adc: Box<dyn AdcDriver>,
    irq: Box<dyn GpioInterrupt>,
    ladder: Box<dyn GpioPin>,
    scheduler: Rc<dyn Scheduler>,
    pad: Weak<Shared>,
    config: DialPadConfig,
    ranges: RangeTable,
    state: PadState,
    samples: u8,
    votes: VoteAccumulator,
    current: Key,
    wait_timer: Option<TaskHandle>,
    hold_timer: Option<TaskHandle>,
}

impl Machine {
    /// Powers the ladder and hands the line over to the ADC.
    fn measure_mode(&mut self) -> GpioResult<()> {
        self.irq.disable_interrupt()?;
        self.ladder.write(true)?;
        self.ladder.set_output_mode()?;
        self.adc.enable()
    }

    /// Unpowers the ladder and hands the line back to the edge interrupt.
    fn interrupt_mode(&mut self) -> GpioResult<()> {
        self.adc.disable()?;
        self.ladder.set_input_mode()?;
        self.irq.enable_interrupt()
    }

    fn begin_cycle(&mut self) -> GpioResult<()> {
        self.votes.begin_cycle();
        self.samples = 0;
        self.sample()
    }

    fn sample(&mut self) -> GpioResult<()> {
        self.state = PadState::Sampling;
        self.adc.start_conversion()
    }

    fn post(&self, delay: Duration, tolerance: Duration, handler: fn(&Shared)) -> TaskHandle {
        let pad = self.pad.clone();
        self.scheduler.post_delayed(
            Box::new(move || {
                if let Some(shared) = pad.upgrade() {
                    handler(&shared);
                }
            }),
            delay,
            tolerance,
        )
    }

    fn wait(&mut self, state: PadState, delay: Duration) {
        trace!("{:?} for {:?}", state, delay);
        self.state = state;
        self.wait_timer = Some(self.post(delay, self.config.tolerance(), Shared::on_timeout));
    }

    fn conversion_done(&mut self, hold_listener: bool, events: &mut Vec<KeyEvent>) -> GpioResult<()> {
        let sample = self.adc.read_result()?;
        let key = self.ranges.classify(sample);
        self.votes.record(key);
        self.samples += 1;
        trace!("Sample {}/{}: {} -> {:?}", self.samples, self.config.samples_per_cycle, sample, key);

        if self.samples < self.config.samples_per_cycle {
            self.wait(PadState::DebounceWait, self.config.debounce_delay());
            return Ok(());
        }

        let winner = self.votes.resolve();
        debug!("Voting cycle resolved to {:?}.", winner);
        self.dispatch(winner, hold_listener, events);

        if self.current == Key::None {
            self.state = PadState::Idle;
            self.interrupt_mode()
        } else {
            self.wait(PadState::RecheckWait, self.config.recheck_delay());
            Ok(())
        }
    }

    /// Compares a resolved key to the current one and queues the resulting events.
    fn dispatch(&mut self, resolved: Key, hold_listener: bool, events: &mut Vec<KeyEvent>) {
        if resolved == self.current {
            return;
        }

        let previous = std::mem::replace(&mut self.current, resolved);
        let legacy = self.config.legacy_notifications;
        debug!("Key changed from {:?} to {:?}.", previous, resolved);

        if legacy || previous.is_key() {
            events.push(KeyEvent::Released(previous));
        }

        self.cancel_hold();
        if resolved == Key::None {
            return;
        }

        if legacy || resolved.is_key() {
            events.push(KeyEvent::Pressed(resolved));
            if hold_listener {
                let hold = self.config.hold_duration();
                self.hold_timer = Some(self.post(hold, self.config.tolerance(), Shared::on_hold_timeout));
            }
        }
    }

    fn cancel_hold(&mut self) {
        if let Some(handle) = self.hold_timer.take() {
            self.scheduler.cancel(handle);
        }
    }

    fn cancel_wait(&mut self) {
        if let Some(handle) = self.wait_timer.take() {
            self.scheduler.cancel(handle);
        }
    }

    /// Gives up on the current cycle after a peripheral failed.
    ///
    /// The pad falls back to reporting no key and waiting for the next edge.
    fn abort(&mut self, err: &GpioError, hold_listener: bool, events: &mut Vec<KeyEvent>) {
        warn!("Dial pad peripheral failed in {:?}: {}. Returning to idle.", self.state, err);
        self.cancel_wait();
        self.dispatch(Key::None, hold_listener, events);
        self.state = PadState::Idle;
        if let Err(e) = self.interrupt_mode() {
            warn!("Failed to re-arm the dial pad interrupt: {}", e);
        }
    }
}

struct Shared {
    machine: RefCell<Machine>,
    listeners: RefCell<Listeners>,
}

impl Shared {
    /// Wraps a handler into a peripheral callback that only posts it to the scheduler.
    fn deferred(pad: Weak<Shared>, scheduler: Rc<dyn Scheduler>, handler: fn(&Shared)) -> IrqHandler {
        Box::new(move || {
            let pad = pad.clone();
            scheduler.post(Box::new(move || {
                if let Some(shared) = pad.upgrade() {
                    handler(&shared);
                }
            }));
        })
    }

    fn hold_listener(&self) -> bool {
        self.listeners.borrow().is_set(ListenerSlot::Hold)
    }

    /// Runs one step of the machine, recovering from peripheral failures, then notifies.
    fn step(&self, step: impl FnOnce(&mut Machine, bool, &mut Vec<KeyEvent>) -> GpioResult<()>) {
        let hold_listener = self.hold_listener();
        let mut events = Vec::new();
        {
            let mut machine = self.machine.borrow_mut();
            if let Err(e) = step(&mut *machine, hold_listener, &mut events) {
                machine.abort(&e, hold_listener, &mut events);
            }
        }
        self.notify(&events);
    }

    fn on_edge(&self) {
        self.step(|machine, _, _| {
            if machine.state != PadState::Idle {
                trace!("Ignoring edge in {:?}.", machine.state);
                return Ok(());
            }
            debug!("Edge detected, sampling.");
            machine.measure_mode()?;
            machine.begin_cycle()
        });
    }

    fn on_conversion(&self) {
        self.step(|machine, hold_listener, events| {
            if machine.state != PadState::Sampling {
                trace!("Ignoring conversion result in {:?}.", machine.state);
                return Ok(());
            }
            machine.conversion_done(hold_listener, events)
        });
    }

    fn on_timeout(&self) {
        self.step(|machine, _, _| {
            machine.wait_timer = None;
            match machine.state {
                PadState::DebounceWait => machine.sample(),
                PadState::RecheckWait => machine.begin_cycle(),
                state => {
                    trace!("Ignoring timeout in {:?}.", state);
                    Ok(())
                }
            }
        });
    }

    fn on_hold_timeout(&self) {
        let key = {
            let mut machine = self.machine.borrow_mut();
            machine.hold_timer = None;
            let key = machine.current;
            let reported = key.is_key() || (machine.config.legacy_notifications && key != Key::None);
            if !reported {
                return;
            }
            key
        };
        debug!("Key {:?} held.", key);
        self.notify(&[KeyEvent::Hold(key)]);
    }

    fn notify(&self, events: &[KeyEvent]) {
        for event in events {
            let slot = event.slot().index();
            let (listener, revision) = {
                let mut listeners = self.listeners.borrow_mut();
                (listeners.slots[slot].take(), listeners.revisions[slot])
            };
            let Some(mut listener) = listener else {
                continue;
            };

            listener(event.key());

            let mut listeners = self.listeners.borrow_mut();
            if listeners.revisions[slot] == revision {
                listeners.slots[slot] = Some(listener);
            }
        }
    }
}

/// A dial pad decoding twelve keys from one resistor ladder line.
///
/// The pad is driven entirely by tasks posted to its [Scheduler]. Tasks only hold weak
/// references to the pad, so it may be dropped at any time; tasks still queued then do nothing.
pub struct DialPad {
    shared: Rc<Shared>,
}

impl Debug for DialPad {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.shared.machine.try_borrow() {
            Ok(machine) => write!(f, "DialPad({:?}, {:?}, {:?})", machine.adc, machine.state, machine.current),
            Err(_) => write!(f, "DialPad(busy)"),
        }
    }
}

impl DialPad {
    /// Creates a dial pad on the shared `line` and the ladder enable pin `ladder`, with the
    /// stock ladder ranges.
    ///
    /// The pad starts out idle, waiting for the line's falling edge.
    pub fn new(
        line: PadLine,
        ladder: Box<dyn GpioPin>,
        scheduler: Rc<dyn Scheduler>,
        config: DialPadConfig,
    ) -> Result<Self, DialPadError> {
        Self::with_ranges(line, ladder, scheduler, config, RangeTable::default())
    }

    /// Creates a dial pad like [DialPad::new], classifying readings with `ranges`.
    pub fn with_ranges(
        line: PadLine,
        ladder: Box<dyn GpioPin>,
        scheduler: Rc<dyn Scheduler>,
        config: DialPadConfig,
        ranges: RangeTable,
    ) -> Result<Self, DialPadError> {
        config.validate()?;

        let PadLine { adc, irq } = line;
        let shared = Rc::new_cyclic(|pad| Shared {
            machine: RefCell::new(Machine {
                adc,
                irq,
                ladder,
                scheduler: scheduler.clone(),
                pad: pad.clone(),
                config,
                ranges,
                state: PadState::Idle,
                samples: 0,
                votes: VoteAccumulator::new(),
                current: Key::None,
                wait_timer: None,
                hold_timer: None,
            }),
            listeners: RefCell::default(),
        });

        {
            let pad = Rc::downgrade(&shared);
            let mut machine = shared.machine.borrow_mut();
            machine.adc.configure(AdcConfig::DIAL_PAD)?;
            machine.adc.on_conversion_complete(Shared::deferred(pad.clone(), scheduler.clone(), Shared::on_conversion))?;
            machine.irq.set_input_mode()?;
            machine.irq.on_falling_edge(Shared::deferred(pad, scheduler, Shared::on_edge))?;
            machine.interrupt_mode()?;
        }

        let pad = DialPad { shared };
        debug!("{:?} initialized.", pad);
        Ok(pad)
    }

    /// Sets the listener called with a key when it becomes the pressed key.
    pub fn on_pressed(&self, listener: impl FnMut(Key) + 'static) {
        self.attach(ListenerSlot::Pressed, Some(Box::new(listener)));
    }

    /// Sets the listener called with the previously pressed key when it is released or
    /// replaced by another key.
    pub fn on_released(&self, listener: impl FnMut(Key) + 'static) {
        self.attach(ListenerSlot::Released, Some(Box::new(listener)));
    }

    /// Sets the listener called with the pressed key once it has been held for the configured
    /// hold duration.
    ///
    /// Only presses that happen after this call arm the hold timer.
    pub fn on_hold(&self, listener: impl FnMut(Key) + 'static) {
        self.attach(ListenerSlot::Hold, Some(Box::new(listener)));
    }

    /// Removes the listener in `slot`, leaving the other slots alone.
    pub fn detach(&self, slot: ListenerSlot) {
        self.attach(slot, None);
    }

    fn attach(&self, slot: ListenerSlot, listener: Option<Listener>) {
        self.shared.listeners.borrow_mut().set(slot, listener);
    }

    pub fn state(&self) -> PadState {
        self.shared.machine.borrow().state
    }

    /// Gets the key reported by the last completed voting cycle.
    pub fn current_key(&self) -> Key {
        self.shared.machine.borrow().current
    }

    /// Checks whether a hold notification is scheduled.
    pub fn hold_pending(&self) -> bool {
        self.shared.machine.borrow().hold_timer.is_some()
    }
}

impl Drop for DialPad {
    fn drop(&mut self) {
        if let Ok(mut machine) = self.shared.machine.try_borrow_mut() {
            machine.cancel_wait();
            machine.cancel_hold();
        }
    }
}
